pub mod events;
pub mod frame_loop;
pub mod frame_scheduler;
pub mod hud;
pub mod notices;
pub mod record_session;
pub mod session_controller;
pub mod session_observer;
pub mod session_state;
