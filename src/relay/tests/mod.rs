//! Relay tests against a scripted engine and a recording transport.
