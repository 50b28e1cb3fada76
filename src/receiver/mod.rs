pub mod receiver_config;
pub mod verification_loop;
