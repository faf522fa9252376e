//! Test bodies shared between the unit tests and the `tests/` suites.
//!
//! Every function takes the options to build its queue with, so the suites can
//! run the same scenario over several arena layouts.
