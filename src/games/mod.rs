//! # Game Implementations
//!
//! Rules for the games the camera can play. Rock-paper-scissors is the only one:
//! gestures double as classifier classes and the referee is a pure function.

pub mod rps;
