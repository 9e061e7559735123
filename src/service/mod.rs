pub mod activity;
pub mod message_flow;
