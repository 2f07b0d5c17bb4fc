pub mod helpers;
mod hub;
