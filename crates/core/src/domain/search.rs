// Search criteria and paging

use crate::application::constants::DEFAULT_PAGE_SIZE;
use crate::domain::access_code::CodeStatus;
use crate::domain::queue::QueueId;
use serde::{Deserialize, Serialize};

/// Zero-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pageable {
    pub page_number: u32,
    pub page_size: u32,
}

impl Pageable {
    pub fn new(page_number: u32, page_size: u32) -> Self {
        Self {
            page_number,
            page_size,
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page_number) * i64::from(self.page_size)
    }
}

impl Default for Pageable {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}

/// Filter for access code searches; `None` fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSearchCriteria {
    #[serde(default)]
    pub queue_id: Option<QueueId>,
    #[serde(default)]
    pub status: Option<CodeStatus>,
    #[serde(default)]
    pub visitor_id: Option<String>,
    pub pageable: Pageable,
}

/// One page of results plus the total number of matches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page_number: u32,
    pub page_size: u32,
    pub total_elements: i64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, pageable: Pageable, total_elements: i64) -> Self {
        Self {
            content,
            page_number: pageable.page_number,
            page_size: pageable.page_size,
            total_elements,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page_number: self.page_number,
            page_size: self.page_size,
            total_elements: self.total_elements,
        }
    }
}
