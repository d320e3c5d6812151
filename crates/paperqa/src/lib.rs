//! Document Q&A Chat Backend Library
//!
//! This library provides the core components for the document Q&A chat
//! backend: WebSocket chat with reconnectable sessions, reply segmentation
//! into typed content blocks, and document upload/search plumbing.

pub mod api;
pub mod blocks;
pub mod chat;
pub mod db;
pub mod document;
pub mod llm;
pub mod ws;
