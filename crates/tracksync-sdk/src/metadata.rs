//! 元数据目录 - 组织单元与项目的分配关系
//!
//! 元数据（schema）同步不在本 SDK 范围内；这里只定义同步引擎消费的
//! 目录接口，以及一个内存实现（宿主可自行接入数据库实现）。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// 项目类别（受控枚举，与服务器端项目类型一致）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgramCategory {
    MultipleEventsWithRegistration,
    SingleEventWithRegistration,
    SingleEventWithoutRegistration,
}

impl ProgramCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MultipleEventsWithRegistration => "multiple_events_with_registration",
            Self::SingleEventWithRegistration => "single_event_with_registration",
            Self::SingleEventWithoutRegistration => "single_event_without_registration",
        }
    }
}

impl FromStr for ProgramCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiple_events_with_registration" => Ok(Self::MultipleEventsWithRegistration),
            "single_event_with_registration" => Ok(Self::SingleEventWithRegistration),
            "single_event_without_registration" => Ok(Self::SingleEventWithoutRegistration),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for ProgramCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 组织单元
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgUnit {
    pub id: String,
    pub label: String,
}

/// 项目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: String,
    pub name: String,
    pub category: ProgramCategory,
}

/// 元数据目录接口
///
/// `assigned_org_units` 必须返回稳定顺序，枚举器的确定性依赖它。
/// `programs_for_org_unit` 返回 `None` 表示该组织单元下没有该类别的分配记录。
pub trait MetadataCatalog: Send + Sync {
    fn assigned_org_units(&self) -> Vec<OrgUnit>;

    fn programs_for_org_unit(
        &self,
        org_unit_id: &str,
        category: ProgramCategory,
    ) -> Option<Vec<Program>>;
}

/// 内存目录实现
///
/// 组织单元按加入顺序返回；项目按 (组织单元, 类别) 分桶，桶内按加入顺序。
#[derive(Debug, Default)]
pub struct StaticCatalog {
    org_units: Vec<OrgUnit>,
    programs: HashMap<(String, ProgramCategory), Vec<Program>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_org_unit(&mut self, id: impl Into<String>, label: impl Into<String>) {
        self.org_units.push(OrgUnit {
            id: id.into(),
            label: label.into(),
        });
    }

    /// 将项目分配给组织单元
    pub fn assign_program(&mut self, org_unit_id: impl Into<String>, program: Program) {
        self.programs
            .entry((org_unit_id.into(), program.category))
            .or_default()
            .push(program);
    }
}

impl MetadataCatalog for StaticCatalog {
    fn assigned_org_units(&self) -> Vec<OrgUnit> {
        self.org_units.clone()
    }

    fn programs_for_org_unit(
        &self,
        org_unit_id: &str,
        category: ProgramCategory,
    ) -> Option<Vec<Program>> {
        self.programs
            .get(&(org_unit_id.to_string(), category))
            .cloned()
    }
}
