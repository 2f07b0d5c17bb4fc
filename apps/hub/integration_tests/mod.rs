//! Process-level tests: the hub started the way `local-hub` starts it.

mod runtime;
