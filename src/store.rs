//! 最近结果存储
//!
//! # 设计思路
//!
//! 只在内存中保留最近 N 条上传结果（新的在前），用于“最近生成”列表展示。
//! 进程退出即丢失，不做持久化。
//!
//! # 实现思路
//!
//! - `VecDeque` 头部插入，超过容量时从尾部截断，即淘汰最旧条目。
//! - 不做内部加锁：只由上传状态机的成功路径写入，单一所有者。

use std::collections::VecDeque;

use crate::model::UploadResult;

/// 默认保留条数。
pub const DEFAULT_RESULT_CAPACITY: usize = 10;

/// 有界、按时间倒序的结果列表。
#[derive(Debug, Clone)]
pub struct ResultStore {
    entries: VecDeque<UploadResult>,
    capacity: usize,
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RESULT_CAPACITY)
    }

    /// 指定容量（最少 1 条）。
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// 插入到最前；超过容量时淘汰最旧条目。
    pub fn insert(&mut self, result: UploadResult) {
        self.entries.push_front(result);
        self.entries.truncate(self.capacity);
    }

    /// 按新到旧的顺序返回全部条目。
    pub fn list(&self) -> Vec<UploadResult> {
        self.entries.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UploadResult> {
        self.entries.iter()
    }

    /// 最新一条。
    pub fn latest(&self) -> Option<&UploadResult> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(n: usize) -> UploadResult {
        let mut result = UploadResult::failure(format!("result-{n}"));
        result.success = true;
        result.title = Some(format!("title-{n}"));
        result
    }

    #[test]
    fn newest_entry_comes_first() {
        let mut store = ResultStore::new();
        store.insert(result(1));
        store.insert(result(2));

        let listed = store.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].message, "result-2");
        assert_eq!(listed[1].message, "result-1");
        assert_eq!(store.latest().map(|r| r.message.as_str()), Some("result-2"));
    }

    #[test]
    fn oldest_entry_is_evicted_past_capacity() {
        let mut store = ResultStore::new();
        for n in 0..=DEFAULT_RESULT_CAPACITY {
            store.insert(result(n));
        }

        assert_eq!(store.len(), DEFAULT_RESULT_CAPACITY);
        assert_eq!(store.latest().map(|r| r.message.as_str()), Some("result-10"));
        assert!(store.iter().all(|r| r.message != "result-0"));
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut store = ResultStore::with_capacity(0);
        store.insert(result(1));
        store.insert(result(2));

        assert_eq!(store.capacity(), 1);
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.list()[0].message, "result-2");
    }
}
