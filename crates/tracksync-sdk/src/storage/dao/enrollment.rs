//! 注册数据访问层

use rusqlite::{params, Connection, Row};

use super::{dt_to_text, text_to_dt};
use crate::error::{Result, TrackSyncError};
use crate::storage::entities::Enrollment;

/// 注册数据访问对象
pub struct EnrollmentDao<'a> {
    conn: &'a Connection,
}

impl<'a> EnrollmentDao<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// 按 uid 插入或覆盖，返回本地主键
    pub fn upsert(&self, enrollment: &Enrollment) -> Result<i64> {
        match self.local_id_by_uid(&enrollment.uid)? {
            Some(local_id) => {
                let sql = "UPDATE enrollment SET
                    org_unit = ?1, program = ?2, status = ?3,
                    tracked_entity_instance_uid = ?4, local_instance_id = ?5,
                    enrollment_date = ?6, from_server = ?7
                    WHERE local_id = ?8";
                self.conn.execute(
                    sql,
                    params![
                        enrollment.org_unit,
                        enrollment.program,
                        enrollment.status,
                        enrollment.tracked_entity_instance_uid,
                        enrollment.local_instance_id,
                        dt_to_text(&enrollment.enrollment_date),
                        enrollment.from_server,
                        local_id,
                    ],
                )?;
                Ok(local_id)
            }
            None => {
                let sql = "INSERT INTO enrollment (
                    uid, org_unit, program, status, tracked_entity_instance_uid,
                    local_instance_id, enrollment_date, from_server
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";
                self.conn.execute(
                    sql,
                    params![
                        enrollment.uid,
                        enrollment.org_unit,
                        enrollment.program,
                        enrollment.status,
                        enrollment.tracked_entity_instance_uid,
                        enrollment.local_instance_id,
                        dt_to_text(&enrollment.enrollment_date),
                        enrollment.from_server,
                    ],
                )?;
                Ok(self.conn.last_insert_rowid())
            }
        }
    }

    /// 按服务器 uid 查本地主键
    pub fn local_id_by_uid(&self, uid: &str) -> Result<Option<i64>> {
        let sql = "SELECT local_id FROM enrollment WHERE uid = ?1";
        match self.conn.query_row(sql, params![uid], |row| row.get(0)) {
            Ok(id) => Ok(Some(id)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(TrackSyncError::Database(format!("查询注册失败: {}", e))),
        }
    }

    /// 按服务器 uid 获取注册
    pub fn get_by_uid(&self, uid: &str) -> Result<Option<Enrollment>> {
        let sql = "SELECT local_id, uid, org_unit, program, status,
            tracked_entity_instance_uid, local_instance_id, enrollment_date, from_server
            FROM enrollment WHERE uid = ?1";
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query_map(params![uid], |row| Ok(row_to_enrollment(row)?))?;
        match rows.next() {
            Some(Ok(enrollment)) => Ok(Some(enrollment)),
            Some(Err(e)) => Err(TrackSyncError::Database(format!("查询注册失败: {}", e))),
            None => Ok(None),
        }
    }
}

fn row_to_enrollment(row: &Row<'_>) -> rusqlite::Result<Enrollment> {
    Ok(Enrollment {
        local_id: Some(row.get(0)?),
        uid: row.get(1)?,
        org_unit: row.get(2)?,
        program: row.get(3)?,
        status: row.get(4)?,
        tracked_entity_instance_uid: row.get(5)?,
        local_instance_id: row.get(6)?,
        enrollment_date: text_to_dt(row.get(7)?),
        from_server: row.get(8)?,
    })
}
