//! 显式校验
//!
//! 每个记录类型实现 [`Validate`]，返回全部违规项而不是遇到第一个就失败。
//! 反序列化（持久化数据的可信路径）不经过这里；外部输入必须先调用 [`ensure_valid`]。

use chrono::{DateTime, Utc};

use batchsync_errors::{SchedulerError, SchedulerResult, Violation};

use crate::time::has_second_accuracy;

pub trait Validate {
    fn validate(&self) -> Vec<Violation>;
}

pub fn validate<T: Validate + ?Sized>(value: &T) -> Vec<Violation> {
    value.validate()
}

pub fn ensure_valid<T: Validate + ?Sized>(value: &T) -> SchedulerResult<()> {
    let violations = value.validate();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(SchedulerError::from_violations(violations))
    }
}

/// 为嵌套字段的违规项加上前缀路径
pub(crate) fn nested(prefix: &str, violations: Vec<Violation>) -> impl Iterator<Item = Violation> + '_ {
    violations.into_iter().map(move |mut violation| {
        violation.path = format!("{prefix}.{}", violation.path);
        violation
    })
}

pub(crate) fn check_accuracy(path: &str, instant: &DateTime<Utc>, out: &mut Vec<Violation>) {
    if !has_second_accuracy(instant) {
        out.push(Violation::new(path, "时间精度必须为整秒，不允许亚秒分量"));
    }
}

pub(crate) fn check_not_blank(path: &str, value: &str, out: &mut Vec<Violation>) {
    if value.trim().is_empty() {
        out.push(Violation::new(path, "不能为空"));
    }
}

pub(crate) fn check_range<'a, I>(path: &str, values: I, min: u32, max: u32, out: &mut Vec<Violation>)
where
    I: IntoIterator<Item = &'a u32>,
{
    for value in values {
        if *value < min || *value > max {
            out.push(Violation::new(
                path,
                format!("取值 {value} 超出范围 {min}..={max}"),
            ));
        }
    }
}
