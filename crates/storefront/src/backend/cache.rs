//! Cache types for catalog reads.

use super::types::CourseRecord;

/// Cache key for catalog reads.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Course(String),
    Courses,
}

/// Cached value types. Only hits are stored; a missing course is never cached.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Course(Box<CourseRecord>),
    Courses(Vec<CourseRecord>),
}
