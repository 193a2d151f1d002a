//! 受访者与属性值数据访问层

use rusqlite::{params, Connection, Row};

use super::{dt_to_text, text_to_dt};
use crate::error::{Result, TrackSyncError};
use crate::storage::entities::{TrackedEntityAttributeValue, TrackedEntityInstance};

/// 受访者数据访问对象
pub struct TrackedEntityInstanceDao<'a> {
    conn: &'a Connection,
}

impl<'a> TrackedEntityInstanceDao<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// 插入新受访者，返回本地主键
    pub fn insert(&self, instance: &TrackedEntityInstance) -> Result<i64> {
        let sql = "INSERT INTO tracked_entity_instance (
            uid, tracked_entity, org_unit, from_server, last_updated
        ) VALUES (?1, ?2, ?3, ?4, ?5)";

        self.conn.execute(
            sql,
            params![
                instance.uid,
                instance.tracked_entity,
                instance.org_unit,
                instance.from_server,
                dt_to_text(&instance.last_updated),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// 按本地主键覆盖
    pub fn update(&self, instance: &TrackedEntityInstance) -> Result<()> {
        let local_id = instance.local_id.ok_or_else(|| {
            TrackSyncError::InvalidData("更新受访者缺少 local_id".to_string())
        })?;
        let sql = "UPDATE tracked_entity_instance SET
            uid = ?1, tracked_entity = ?2, org_unit = ?3, from_server = ?4, last_updated = ?5
            WHERE local_id = ?6";

        self.conn.execute(
            sql,
            params![
                instance.uid,
                instance.tracked_entity,
                instance.org_unit,
                instance.from_server,
                dt_to_text(&instance.last_updated),
                local_id,
            ],
        )?;

        Ok(())
    }

    /// 按 uid 插入或覆盖，返回本地主键
    pub fn upsert(&self, instance: &TrackedEntityInstance) -> Result<i64> {
        match self.local_id_by_uid(&instance.uid)? {
            Some(local_id) => {
                let mut updated = instance.clone();
                updated.local_id = Some(local_id);
                self.update(&updated)?;
                Ok(local_id)
            }
            None => self.insert(instance),
        }
    }

    /// 按服务器 uid 查本地主键
    pub fn local_id_by_uid(&self, uid: &str) -> Result<Option<i64>> {
        let sql = "SELECT local_id FROM tracked_entity_instance WHERE uid = ?1";
        match self.conn.query_row(sql, params![uid], |row| row.get(0)) {
            Ok(id) => Ok(Some(id)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(TrackSyncError::Database(format!("查询受访者失败: {}", e))),
        }
    }

    /// 按服务器 uid 获取受访者
    pub fn get_by_uid(&self, uid: &str) -> Result<Option<TrackedEntityInstance>> {
        let sql = "SELECT local_id, uid, tracked_entity, org_unit, from_server, last_updated
            FROM tracked_entity_instance WHERE uid = ?1";
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query_map(params![uid], |row| Ok(row_to_instance(row)?))?;
        match rows.next() {
            Some(Ok(instance)) => Ok(Some(instance)),
            Some(Err(e)) => Err(TrackSyncError::Database(format!("查询受访者失败: {}", e))),
            None => Ok(None),
        }
    }
}

fn row_to_instance(row: &Row<'_>) -> rusqlite::Result<TrackedEntityInstance> {
    Ok(TrackedEntityInstance {
        local_id: Some(row.get(0)?),
        uid: row.get(1)?,
        tracked_entity: row.get(2)?,
        org_unit: row.get(3)?,
        from_server: row.get(4)?,
        last_updated: text_to_dt(row.get(5)?),
    })
}

/// 受访者属性值数据访问对象
pub struct TrackedEntityAttributeValueDao<'a> {
    conn: &'a Connection,
}

impl<'a> TrackedEntityAttributeValueDao<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// 按 (attribute, 受访者 uid) 插入或覆盖，返回本地主键
    pub fn upsert(&self, value: &TrackedEntityAttributeValue) -> Result<i64> {
        let existing: Option<i64> = {
            let sql = "SELECT local_id FROM tracked_entity_attribute_value
                WHERE attribute = ?1 AND tracked_entity_instance_uid = ?2";
            match self.conn.query_row(
                sql,
                params![value.attribute, value.tracked_entity_instance_uid],
                |row| row.get(0),
            ) {
                Ok(id) => Some(id),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => {
                    return Err(TrackSyncError::Database(format!("查询属性值失败: {}", e)))
                }
            }
        };

        match existing {
            Some(local_id) => {
                let sql = "UPDATE tracked_entity_attribute_value SET
                    value = ?1, local_instance_id = ?2 WHERE local_id = ?3";
                self.conn.execute(
                    sql,
                    params![value.value, value.local_instance_id, local_id],
                )?;
                Ok(local_id)
            }
            None => {
                let sql = "INSERT INTO tracked_entity_attribute_value (
                    attribute, value, tracked_entity_instance_uid, local_instance_id
                ) VALUES (?1, ?2, ?3, ?4)";
                self.conn.execute(
                    sql,
                    params![
                        value.attribute,
                        value.value,
                        value.tracked_entity_instance_uid,
                        value.local_instance_id,
                    ],
                )?;
                Ok(self.conn.last_insert_rowid())
            }
        }
    }

    /// 某个受访者的全部属性值
    pub fn list_for_instance(&self, uid: &str) -> Result<Vec<TrackedEntityAttributeValue>> {
        let sql = "SELECT local_id, attribute, value, tracked_entity_instance_uid, local_instance_id
            FROM tracked_entity_attribute_value
            WHERE tracked_entity_instance_uid = ?1 ORDER BY local_id";
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![uid], |row| {
            Ok(TrackedEntityAttributeValue {
                local_id: Some(row.get(0)?),
                attribute: row.get(1)?,
                value: row.get(2)?,
                tracked_entity_instance_uid: row.get(3)?,
                local_instance_id: row.get(4)?,
            })
        })?;

        let mut values = Vec::new();
        for row in rows {
            values.push(row.map_err(|e| {
                TrackSyncError::Database(format!("查询属性值失败: {}", e))
            })?);
        }
        Ok(values)
    }
}
