pub mod message_composer;
pub mod sender_config;
pub mod traffic_generator;
