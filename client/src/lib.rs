mod admin;
mod app;
mod dom;
mod forms;
mod home;
mod net;
mod render;
mod state;
mod util;
mod ws;

pub use app::run;
