//! Optional async helpers for loading chapter markup.
//!
//! This module is available with the `async` feature.

extern crate alloc;

use alloc::vec::Vec;
use core::result::Result;
use std::path::Path;

use crate::error::ReaderError;
use crate::markup::{parse_markup, MarkupNode};

/// Read a markup file asynchronously and parse it into top-level nodes.
///
/// The caller awaits this before any annotation runs; the parsed result is
/// the pristine copy every later re-annotation starts from.
pub async fn read_document_async<P: AsRef<Path>>(path: P) -> Result<Vec<MarkupNode>, ReaderError> {
    let html = tokio::fs::read_to_string(path).await?;
    Ok(parse_markup(&html)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_document_async() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chapter.xhtml");
        std::fs::write(&path, "<p>Hello</p>").unwrap();
        let nodes = read_document_async(&path).await.unwrap();
        assert_eq!(nodes, vec![MarkupNode::element("p", vec![MarkupNode::text("Hello")])]);
    }

    #[tokio::test]
    async fn test_read_document_async_missing_file() {
        let err = read_document_async("/nonexistent/chapter.xhtml")
            .await
            .unwrap_err();
        assert!(matches!(err, ReaderError::Io(_)));
    }
}
