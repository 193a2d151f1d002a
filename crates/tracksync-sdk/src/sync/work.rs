//! 工作集枚举 - 把三层嵌套展平成有序工作项序列
//!
//! 原有形态是组织单元 × 项目类别 × 项目的三层可空列表循环；这里
//! 重构为惰性迭代器，调用方只看到「下一个工作项」。顺序固定：
//! 外层组织单元，中层集合类型，内层项目按 MEWR → SEWR → SEWoR
//! 的开关检查顺序拼接。给定同一份目录和开关，两次枚举产出逐字节
//! 相同的序列。

use serde::{Deserialize, Serialize};

use crate::metadata::{MetadataCatalog, Program, ProgramCategory};
use crate::storage::kv::KvStore;
use crate::error::Result;

const FLAGS_KEY: &str = "sync_flags";

/// 集合类型（受控枚举）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionKind {
    TrackedEntityInstances,
    Enrollments,
    Events,
}

impl CollectionKind {
    /// 枚举顺序固定：受访者 → 注册 → 事件
    pub const ALL: [CollectionKind; 3] = [
        CollectionKind::TrackedEntityInstances,
        CollectionKind::Enrollments,
        CollectionKind::Events,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TrackedEntityInstances => "tracked_entity_instances",
            Self::Enrollments => "enrollments",
            Self::Events => "events",
        }
    }

    /// 该集合类型要收集哪些项目类别
    ///
    /// 无注册单事件（SEWoR）只出现在事件集合里。
    fn categories(self) -> &'static [ProgramCategory] {
        match self {
            Self::Events => &[
                ProgramCategory::MultipleEventsWithRegistration,
                ProgramCategory::SingleEventWithRegistration,
                ProgramCategory::SingleEventWithoutRegistration,
            ],
            _ => &[
                ProgramCategory::MultipleEventsWithRegistration,
                ProgramCategory::SingleEventWithRegistration,
            ],
        }
    }
}

impl std::fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 同步工作项：身份是（集合类型, 组织单元, 项目）三元组
///
/// 每次枚举新建，不持久化；台账键由三元组拼出。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItem {
    pub kind: CollectionKind,
    pub org_unit: String,
    pub program: String,
}

impl WorkItem {
    /// 台账键：`{kind}:{org_unit}:{program}`
    pub fn ledger_key(&self) -> String {
        format!("{}:{}:{}", self.kind.as_str(), self.org_unit, self.program)
    }
}

/// 同步开关：三个集合类型与三个项目类别各自独立
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFlags {
    pub tracked_entity_instances: bool,
    pub enrollments: bool,
    pub events: bool,
    pub multiple_events_with_registration: bool,
    pub single_event_with_registration: bool,
    pub single_event_without_registration: bool,
}

impl Default for SyncFlags {
    fn default() -> Self {
        Self {
            tracked_entity_instances: true,
            enrollments: true,
            events: true,
            multiple_events_with_registration: true,
            single_event_with_registration: true,
            single_event_without_registration: true,
        }
    }
}

impl SyncFlags {
    pub fn collection_enabled(&self, kind: CollectionKind) -> bool {
        match kind {
            CollectionKind::TrackedEntityInstances => self.tracked_entity_instances,
            CollectionKind::Enrollments => self.enrollments,
            CollectionKind::Events => self.events,
        }
    }

    pub fn category_enabled(&self, category: ProgramCategory) -> bool {
        match category {
            ProgramCategory::MultipleEventsWithRegistration => {
                self.multiple_events_with_registration
            }
            ProgramCategory::SingleEventWithRegistration => self.single_event_with_registration,
            ProgramCategory::SingleEventWithoutRegistration => {
                self.single_event_without_registration
            }
        }
    }

    /// 从 KV 读取；没存过返回默认全开
    pub async fn load(kv: &KvStore) -> Result<Self> {
        Ok(kv.get(FLAGS_KEY).await?.unwrap_or_default())
    }

    /// 持久化到 KV
    pub async fn store(&self, kv: &KvStore) -> Result<()> {
        kv.set(FLAGS_KEY, self).await
    }
}

/// 枚举工作集
///
/// 惰性产出；每个组织单元的工作项在迭代到它时才收集。
pub fn enumerate<'a>(
    catalog: &'a dyn MetadataCatalog,
    flags: &'a SyncFlags,
) -> impl Iterator<Item = WorkItem> + 'a {
    catalog
        .assigned_org_units()
        .into_iter()
        .flat_map(move |org_unit| {
            let mut items = Vec::new();
            for kind in CollectionKind::ALL {
                if !flags.collection_enabled(kind) {
                    continue;
                }
                for program in programs_for_kind(catalog, &org_unit.id, kind, flags) {
                    items.push(WorkItem {
                        kind,
                        org_unit: org_unit.id.clone(),
                        program: program.id,
                    });
                }
            }
            items
        })
}

/// 按开关检查顺序拼接一个组织单元下某集合类型的项目列表
fn programs_for_kind(
    catalog: &dyn MetadataCatalog,
    org_unit_id: &str,
    kind: CollectionKind,
    flags: &SyncFlags,
) -> Vec<Program> {
    let mut programs = Vec::new();
    for &category in kind.categories() {
        if !flags.category_enabled(category) {
            continue;
        }
        if let Some(assigned) = catalog.programs_for_org_unit(org_unit_id, category) {
            programs.extend(assigned);
        }
    }
    programs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::StaticCatalog;

    fn program(id: &str, category: ProgramCategory) -> Program {
        Program {
            id: id.to_string(),
            name: id.to_string(),
            category,
        }
    }

    fn fixture() -> StaticCatalog {
        let mut catalog = StaticCatalog::new();
        catalog.add_org_unit("OU1", "Eastern District");
        catalog.add_org_unit("OU2", "Western District");
        catalog.assign_program(
            "OU1",
            program("P1", ProgramCategory::MultipleEventsWithRegistration),
        );
        catalog.assign_program(
            "OU1",
            program("P2", ProgramCategory::SingleEventWithoutRegistration),
        );
        catalog.assign_program(
            "OU2",
            program("P3", ProgramCategory::SingleEventWithRegistration),
        );
        catalog
    }

    #[test]
    fn ledger_key_format() {
        let item = WorkItem {
            kind: CollectionKind::Events,
            org_unit: "OU1".to_string(),
            program: "P1".to_string(),
        };
        assert_eq!(item.ledger_key(), "events:OU1:P1");
    }

    #[test]
    fn enumeration_is_deterministic() {
        let catalog = fixture();
        let flags = SyncFlags::default();
        let first: Vec<WorkItem> = enumerate(&catalog, &flags).collect();
        let second: Vec<WorkItem> = enumerate(&catalog, &flags).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn enumeration_order_is_org_unit_then_kind_then_program() {
        let catalog = fixture();
        let flags = SyncFlags::default();
        let keys: Vec<String> = enumerate(&catalog, &flags)
            .map(|i| i.ledger_key())
            .collect();
        assert_eq!(
            keys,
            vec![
                // OU1：SEWoR 项目 P2 只进入事件集合
                "tracked_entity_instances:OU1:P1",
                "enrollments:OU1:P1",
                "events:OU1:P1",
                "events:OU1:P2",
                // OU2
                "tracked_entity_instances:OU2:P3",
                "enrollments:OU2:P3",
                "events:OU2:P3",
            ]
        );
    }

    #[test]
    fn disabled_collection_is_skipped() {
        let catalog = fixture();
        let flags = SyncFlags {
            enrollments: false,
            ..SyncFlags::default()
        };
        assert!(enumerate(&catalog, &flags)
            .all(|i| i.kind != CollectionKind::Enrollments));
    }

    #[test]
    fn disabled_category_removes_its_programs() {
        let catalog = fixture();
        let flags = SyncFlags {
            single_event_without_registration: false,
            ..SyncFlags::default()
        };
        let keys: Vec<String> = enumerate(&catalog, &flags)
            .map(|i| i.ledger_key())
            .collect();
        assert!(!keys.contains(&"events:OU1:P2".to_string()));
        assert!(keys.contains(&"events:OU1:P1".to_string()));
    }
}
