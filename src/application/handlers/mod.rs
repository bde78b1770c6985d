pub mod message_dispatcher;
pub mod outcome_recorder;
