pub mod failure_backoff;
pub mod infrastructure;
pub mod monitor_session;
pub mod pipeline_logger;
pub mod render_loop;
pub mod render_state;
