mod ipc_tests;
mod relay_client;
mod voice;
