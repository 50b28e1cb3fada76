pub mod buffer_size;
pub mod join_plan;
pub mod socket_session;
pub mod source_filter;
