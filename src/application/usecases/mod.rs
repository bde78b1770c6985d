pub mod create_messages;
pub mod send_messages;
