//! End-to-end tests: a real proxy on a loopback port in front of a
//! loopback origin.


pub mod support;
