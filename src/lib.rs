#![crate_name = "of_core"]
#![crate_type = "lib"]

#[macro_use]
extern crate log;

#[macro_use]
mod ofp_utils;

pub mod apps;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod event;
pub mod handshake;
pub mod keepalive;
pub mod message;
pub mod multipart;
pub mod ofp_controller;
pub mod ofp_device;
pub mod ofp_header;
pub mod ofp_message;
pub mod ofp_serialization;
pub mod openflow;
pub mod openflow0x01;
pub mod openflow0x04;
pub mod packet;
pub mod session;
pub mod switch;
pub mod sync;
