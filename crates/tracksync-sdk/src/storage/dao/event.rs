//! 事件与数据值数据访问层
//!
//! 事件表不做 upsert：覆盖与否由调和器按来源标记决定，DAO 只提供
//! 纯粹的 insert / update / 查询。

use rusqlite::{params, Connection, Row};

use super::{dt_to_text, text_to_dt};
use crate::error::{Result, TrackSyncError};
use crate::storage::entities::{DataValue, Event};

/// 事件数据访问对象
pub struct EventDao<'a> {
    conn: &'a Connection,
}

impl<'a> EventDao<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// 插入新事件，返回本地主键
    pub fn insert(&self, event: &Event) -> Result<i64> {
        let sql = "INSERT INTO event (
            uid, enrollment_uid, local_enrollment_id, org_unit, program,
            program_stage, status, event_date, from_server
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

        self.conn.execute(
            sql,
            params![
                event.uid,
                event.enrollment_uid,
                event.local_enrollment_id,
                event.org_unit,
                event.program,
                event.program_stage,
                event.status,
                dt_to_text(&event.event_date),
                event.from_server,
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// 按本地主键覆盖
    pub fn update(&self, event: &Event) -> Result<()> {
        let local_id = event
            .local_id
            .ok_or_else(|| TrackSyncError::InvalidData("更新事件缺少 local_id".to_string()))?;
        let sql = "UPDATE event SET
            uid = ?1, enrollment_uid = ?2, local_enrollment_id = ?3, org_unit = ?4,
            program = ?5, program_stage = ?6, status = ?7, event_date = ?8, from_server = ?9
            WHERE local_id = ?10";

        self.conn.execute(
            sql,
            params![
                event.uid,
                event.enrollment_uid,
                event.local_enrollment_id,
                event.org_unit,
                event.program,
                event.program_stage,
                event.status,
                dt_to_text(&event.event_date),
                event.from_server,
                local_id,
            ],
        )?;

        Ok(())
    }

    /// 按服务器 uid 获取事件（不含数据值）
    pub fn get_by_uid(&self, uid: &str) -> Result<Option<Event>> {
        let sql = "SELECT local_id, uid, enrollment_uid, local_enrollment_id, org_unit,
            program, program_stage, status, event_date, from_server
            FROM event WHERE uid = ?1";
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query_map(params![uid], |row| Ok(row_to_event(row)?))?;
        match rows.next() {
            Some(Ok(event)) => Ok(Some(event)),
            Some(Err(e)) => Err(TrackSyncError::Database(format!("查询事件失败: {}", e))),
            None => Ok(None),
        }
    }
}

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        local_id: Some(row.get(0)?),
        uid: row.get(1)?,
        enrollment_uid: row.get(2)?,
        local_enrollment_id: row.get(3)?,
        org_unit: row.get(4)?,
        program: row.get(5)?,
        program_stage: row.get(6)?,
        status: row.get(7)?,
        event_date: text_to_dt(row.get(8)?),
        from_server: row.get(9)?,
        data_values: Vec::new(),
    })
}

/// 事件数据值数据访问对象
pub struct DataValueDao<'a> {
    conn: &'a Connection,
}

impl<'a> DataValueDao<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// 按 (data_element, 事件 uid) 插入或覆盖，返回本地主键
    pub fn upsert(&self, value: &DataValue) -> Result<i64> {
        let existing: Option<i64> = {
            let sql = "SELECT local_id FROM data_value
                WHERE data_element = ?1 AND event_uid = ?2";
            match self
                .conn
                .query_row(sql, params![value.data_element, value.event_uid], |row| {
                    row.get(0)
                }) {
                Ok(id) => Some(id),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => {
                    return Err(TrackSyncError::Database(format!("查询数据值失败: {}", e)))
                }
            }
        };

        match existing {
            Some(local_id) => {
                let sql =
                    "UPDATE data_value SET value = ?1, local_event_id = ?2 WHERE local_id = ?3";
                self.conn
                    .execute(sql, params![value.value, value.local_event_id, local_id])?;
                Ok(local_id)
            }
            None => {
                let sql = "INSERT INTO data_value (
                    data_element, value, event_uid, local_event_id
                ) VALUES (?1, ?2, ?3, ?4)";
                self.conn.execute(
                    sql,
                    params![
                        value.data_element,
                        value.value,
                        value.event_uid,
                        value.local_event_id,
                    ],
                )?;
                Ok(self.conn.last_insert_rowid())
            }
        }
    }

    /// 某个事件的全部数据值
    pub fn list_for_event(&self, event_uid: &str) -> Result<Vec<DataValue>> {
        let sql = "SELECT local_id, data_element, value, event_uid, local_event_id
            FROM data_value WHERE event_uid = ?1 ORDER BY local_id";
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![event_uid], |row| {
            Ok(DataValue {
                local_id: Some(row.get(0)?),
                data_element: row.get(1)?,
                value: row.get(2)?,
                event_uid: row.get(3)?,
                local_event_id: row.get(4)?,
            })
        })?;

        let mut values = Vec::new();
        for row in rows {
            values.push(
                row.map_err(|e| TrackSyncError::Database(format!("查询数据值失败: {}", e)))?,
            );
        }
        Ok(values)
    }
}
