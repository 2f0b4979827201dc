//! 预览句柄登记表 - 基础设施层
//!
//! 持有所有预览句柄，只暴露"申请"和"释放"两种能力

use std::collections::HashSet;
use std::fmt::Display;

use tracing::debug;

use crate::error::CaptureError;

/// 预览句柄
///
/// 不实现 `Clone`：一个句柄只属于一张图片，释放时按值交回登记表，因此不会重复释放
#[derive(Debug, PartialEq, Eq)]
pub struct PreviewHandle {
    id: u64,
}

impl PreviewHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// 展示层使用的引用地址
    pub fn url(&self) -> String {
        format!("preview://{}", self.id)
    }
}

impl Display for PreviewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.id)
    }
}

/// 预览句柄登记表
///
/// 职责：
/// - 发放新句柄（编号单调递增，释放后不会复用）
/// - 回收句柄并记录释放次数
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    next_id: u64,
    live: HashSet<u64>,
    released: u64,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 申请一个新句柄
    pub fn mint(&mut self) -> PreviewHandle {
        self.next_id += 1;
        let id = self.next_id;
        self.live.insert(id);
        debug!("申请预览句柄 #{}", id);
        PreviewHandle { id }
    }

    /// 释放句柄
    pub fn release(&mut self, handle: PreviewHandle) -> Result<(), CaptureError> {
        if !self.live.remove(&handle.id) {
            return Err(CaptureError::HandleNotLive { id: handle.id });
        }
        self.released += 1;
        debug!("释放预览句柄 #{}", handle.id);
        Ok(())
    }

    pub fn is_live(&self, id: u64) -> bool {
        self.live.contains(&id)
    }

    /// 当前未释放的句柄数量
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// 累计释放次数
    pub fn released_count(&self) -> u64 {
        self.released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_is_unique_and_never_reused() {
        let mut registry = PreviewRegistry::new();
        let a = registry.mint();
        let b = registry.mint();
        assert_ne!(a.id(), b.id());

        let a_id = a.id();
        registry.release(a).unwrap();
        let c = registry.mint();
        assert_ne!(c.id(), a_id);
        assert!(!registry.is_live(a_id));
        assert_eq!(registry.live_count(), 2);
        assert_eq!(registry.released_count(), 1);
    }

    #[test]
    fn test_foreign_handle_is_rejected() {
        let mut mine = PreviewRegistry::new();
        let mut other = PreviewRegistry::new();
        let _kept = mine.mint();
        let _ = other.mint();
        let _ = other.mint();
        let stray = other.mint();

        assert_eq!(
            mine.release(stray),
            Err(CaptureError::HandleNotLive { id: 3 })
        );
        assert_eq!(mine.live_count(), 1);
        assert_eq!(mine.released_count(), 0);
    }

    #[test]
    fn test_url_format() {
        let mut registry = PreviewRegistry::new();
        let handle = registry.mint();
        assert_eq!(handle.url(), "preview://1");
        assert_eq!(handle.to_string(), "#1");
    }
}
