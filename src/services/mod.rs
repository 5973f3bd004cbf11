pub mod booking;
pub mod conflict;
pub mod multi_player;
pub mod notify;
pub mod overlap;
pub mod schedule;
pub mod settlement;

#[cfg(test)]
pub(crate) mod test_support;
