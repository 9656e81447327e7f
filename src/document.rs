//! 定义文件与请求文件
//!
//! 定义文件是一个 JSON 对象：
//!
//! ```json
//! {
//!   "jobDefinitions": [ { "id": "import-users", ... } ],
//!   "scheduleDefinitions": [ { "id": "nightly", "jobdefId": "import-users", ... } ]
//! }
//! ```
//!
//! 每条记录都经过完整校验；任何一条不合法时整个文件被拒绝，错误信息列出全部问题。

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

use batchsync_domain::{JobCreationRequest, JobDefinition, ScheduleDefinition, SchedulerResult};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    #[serde(default)]
    job_definitions: Vec<Value>,
    #[serde(default)]
    schedule_definitions: Vec<Value>,
}

/// 已校验的定义集合
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Definitions {
    pub jobdefs: Vec<JobDefinition>,
    pub schedefs: Vec<ScheduleDefinition>,
}

impl Definitions {
    pub fn parse(text: &str) -> Result<Self> {
        let raw: RawDocument = serde_json::from_str(text).context("定义文件不是合法的 JSON")?;

        let mut problems = Vec::new();
        let jobdefs = parse_all(
            "jobDefinitions",
            raw.job_definitions,
            JobDefinition::parse,
            &mut problems,
        );
        let schedefs = parse_all(
            "scheduleDefinitions",
            raw.schedule_definitions,
            ScheduleDefinition::parse,
            &mut problems,
        );

        if !problems.is_empty() {
            bail!("定义文件校验失败:\n{}", problems.join("\n"));
        }
        Ok(Self { jobdefs, schedefs })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("读取定义文件失败: {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("解析定义文件失败: {}", path.display()))
    }
}

fn parse_all<T>(
    section: &str,
    values: Vec<Value>,
    parse: fn(Value) -> SchedulerResult<T>,
    problems: &mut Vec<String>,
) -> Vec<T> {
    let mut parsed = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        match parse(value) {
            Ok(record) => parsed.push(record),
            Err(e) => problems.push(format!("  {section}[{index}]: {e}")),
        }
    }
    parsed
}

/// 读取一个手工作业请求
pub fn load_request(path: &Path) -> Result<JobCreationRequest> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("读取请求文件失败: {}", path.display()))?;
    let value: Value = serde_json::from_str(&text).context("请求文件不是合法的 JSON")?;
    JobCreationRequest::parse(value).with_context(|| format!("请求文件校验失败: {}", path.display()))
}
