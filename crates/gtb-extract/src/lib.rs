//! Content extraction for incoming documents and links: PDF text and the
//! visible text of web pages.

pub mod html;
pub mod pdf;
