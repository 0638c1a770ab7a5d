//! # Tag Client Library
//!
//! A thin client for the tag server. The server is authoritative for tag
//! state and speed; the client only moves its own player and draws what the
//! server reports.
//!
//! ## Frame Loop
//!
//! Once per rendered frame the client:
//! 1. takes the newest `ServerState`, if any, and adopts its speed
//! 2. samples the movement keys
//! 3. moves the local player and resolves wall collisions against the map
//! 4. sends its position as a `ClientState`
//! 5. draws the floor lit where the player can see it, then walls and players
//!
//! ## Module Organization
//!
//! - `map`: tile map parsing, wall lookup and line of sight
//! - `game`: local movement and the last snapshot
//! - `input`: keyboard to direction vector
//! - `network`: discovery and the background connection
//! - `rendering`: macroquad drawing

pub mod game;
pub mod input;
pub mod map;
pub mod network;
pub mod rendering;
