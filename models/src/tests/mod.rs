mod client_builder;
mod mark_task;
mod protocol;
mod session;
