//! 题目仓库 - 基础设施层
//!
//! 持有唯一的 SQLite 连接，只暴露"读写会话与题目"的能力

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::{
    NewQuestion, NewSession, QuestionRecord, QuestionSpec, QuestionUpdate, QuestionView,
    SessionDetail, SessionRecord, SessionType, Statistics,
};

type StoreResult<T> = Result<T, StoreError>;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS generation_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_type TEXT NOT NULL,
    created_at TEXT NOT NULL,
    source_file TEXT,
    source_text TEXT,
    config TEXT
);

CREATE TABLE IF NOT EXISTS generated_questions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL
        REFERENCES generation_sessions(id) ON DELETE CASCADE,
    question_type TEXT NOT NULL,
    question_text TEXT NOT NULL,
    explanation TEXT NOT NULL DEFAULT '',
    difficulty TEXT,
    confidence_score REAL,
    options TEXT,
    correct_answer TEXT,
    sample_answer TEXT,
    image_url TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_questions_session ON generated_questions(session_id);
CREATE INDEX IF NOT EXISTS idx_sessions_created ON generation_sessions(created_at);
"#;

const SESSION_COLUMNS: &str = "s.id, s.session_type, s.created_at, s.source_file, s.source_text, s.config,
     (SELECT COUNT(*) FROM generated_questions q WHERE q.session_id = s.id)";

const QUESTION_COLUMNS: &str = "id, session_id, question_type, question_text, explanation, difficulty,
     confidence_score, options, correct_answer, sample_answer, image_url, created_at, updated_at";

/// 题目仓库
///
/// 职责：
/// - 持有唯一的 Connection
/// - 建表、开启外键（删除会话级联删除题目）
/// - 不认识 LLM / HTTP
pub struct QuestionStore {
    conn: Mutex<Connection>,
}

impl QuestionStore {
    /// 打开（或创建）数据库文件
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            // 目录创建失败时交给 open 报错
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        info!("✓ 数据库已打开: {}", path.display());
        Self::with_connection(conn)
    }

    /// 内存数据库（测试用）
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// 新建会话，返回会话 ID
    pub fn create_session(&self, session: &NewSession) -> StoreResult<i64> {
        let conn = self.conn.lock();
        insert_session(&conn, session)
    }

    /// 在会话下新增一道题，返回题目 ID
    pub fn create_question(&self, session_id: i64, question: &NewQuestion) -> StoreResult<i64> {
        let conn = self.conn.lock();
        insert_question(&conn, session_id, question)
    }

    /// 一次生成的完整落库：会话 + 全部题目，同一事务
    ///
    /// `image_url` 不为空时覆盖每道题的图片地址。
    pub fn record_generation(
        &self,
        session: &NewSession,
        questions: &[QuestionSpec],
        image_url: Option<&str>,
    ) -> StoreResult<i64> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let session_id = insert_session(&tx, session)?;
        for spec in questions {
            let mut row = NewQuestion::from(spec);
            if let Some(url) = image_url {
                row.image_url = Some(url.to_string());
            }
            insert_question(&tx, session_id, &row)?;
        }
        tx.commit()?;

        debug!(
            "会话 {} 已保存 ({}, {} 道题)",
            session_id,
            session.session_type.as_str(),
            questions.len()
        );
        Ok(session_id)
    }

    /// 最近的会话，按创建时间倒序
    pub fn recent_sessions(
        &self,
        limit: usize,
        session_type: Option<SessionType>,
    ) -> StoreResult<Vec<SessionRecord>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM generation_sessions s
             WHERE (?1 IS NULL OR s.session_type = ?1)
             ORDER BY s.created_at DESC, s.id DESC
             LIMIT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![session_type.map(SessionType::as_str), limit as i64],
            session_from_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// 会话详情（含题目），不存在返回 None
    pub fn session_detail(&self, session_id: i64) -> StoreResult<Option<SessionDetail>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {SESSION_COLUMNS} FROM generation_sessions s WHERE s.id = ?1");
        let Some(session) = conn
            .query_row(&sql, params![session_id], session_from_row)
            .optional()?
        else {
            return Ok(None);
        };

        let questions = questions_of(&conn, session_id)?
            .iter()
            .map(QuestionView::from)
            .collect();
        Ok(Some(SessionDetail { session, questions }))
    }

    /// 会话下的全部题目
    pub fn session_questions(&self, session_id: i64) -> StoreResult<Vec<QuestionRecord>> {
        let conn = self.conn.lock();
        questions_of(&conn, session_id)
    }

    pub fn question(&self, question_id: i64) -> StoreResult<Option<QuestionRecord>> {
        let conn = self.conn.lock();
        question_by_id(&conn, question_id)
    }

    /// 删除会话（级联删除题目），返回是否存在
    pub fn delete_session(&self, session_id: i64) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let affected = conn.execute(
            "DELETE FROM generation_sessions WHERE id = ?1",
            params![session_id],
        )?;
        Ok(affected > 0)
    }

    /// 部分更新题目，未给出的字段保持不变；题目不存在返回 None
    pub fn update_question(
        &self,
        question_id: i64,
        update: &QuestionUpdate,
    ) -> StoreResult<Option<QuestionRecord>> {
        let conn = self.conn.lock();
        let options = update
            .options
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let affected = conn.execute(
            "UPDATE generated_questions SET
                question_text = COALESCE(?1, question_text),
                explanation = COALESCE(?2, explanation),
                options = COALESCE(?3, options),
                correct_answer = COALESCE(?4, correct_answer),
                sample_answer = COALESCE(?5, sample_answer),
                updated_at = ?6
             WHERE id = ?7",
            params![
                update.question_text,
                update.explanation,
                options,
                update.correct_answer,
                update.sample_answer,
                Utc::now(),
                question_id,
            ],
        )?;
        if affected == 0 {
            return Ok(None);
        }
        question_by_id(&conn, question_id)
    }

    /// 使用统计
    pub fn statistics(&self) -> StoreResult<Statistics> {
        let conn = self.conn.lock();
        let total_sessions =
            conn.query_row("SELECT COUNT(*) FROM generation_sessions", [], |r| r.get(0))?;
        let total_questions =
            conn.query_row("SELECT COUNT(*) FROM generated_questions", [], |r| r.get(0))?;
        let since: DateTime<Utc> = Utc::now() - Duration::days(7);
        let recent_sessions_7d = conn.query_row(
            "SELECT COUNT(*) FROM generation_sessions WHERE created_at >= ?1",
            params![since],
            |r| r.get(0),
        )?;

        Ok(Statistics {
            total_sessions,
            total_questions,
            recent_sessions_7d,
        })
    }
}

fn insert_session(conn: &Connection, session: &NewSession) -> StoreResult<i64> {
    let config = session
        .config
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.execute(
        "INSERT INTO generation_sessions (session_type, created_at, source_file, source_text, config)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            session.session_type.as_str(),
            Utc::now(),
            session.source_file,
            session.source_text,
            config,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_question(conn: &Connection, session_id: i64, question: &NewQuestion) -> StoreResult<i64> {
    let options = question
        .options
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let now = Utc::now();
    conn.execute(
        "INSERT INTO generated_questions (
            session_id, question_type, question_text, explanation, difficulty,
            confidence_score, options, correct_answer, sample_answer, image_url,
            created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            session_id,
            question.question_type,
            question.question_text,
            question.explanation,
            question.difficulty,
            question.confidence_score,
            options,
            question.correct_answer,
            question.sample_answer,
            question.image_url,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn questions_of(conn: &Connection, session_id: i64) -> StoreResult<Vec<QuestionRecord>> {
    let sql = format!(
        "SELECT {QUESTION_COLUMNS} FROM generated_questions WHERE session_id = ?1 ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![session_id], question_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn question_by_id(conn: &Connection, question_id: i64) -> StoreResult<Option<QuestionRecord>> {
    let sql = format!("SELECT {QUESTION_COLUMNS} FROM generated_questions WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![question_id], question_from_row)
        .optional()?)
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    let question_count: i64 = row.get(6)?;
    Ok(SessionRecord {
        id: row.get(0)?,
        session_type: row.get(1)?,
        created_at: row.get(2)?,
        source_file: row.get(3)?,
        source_text: row.get(4)?,
        config: json_column(row, 5)?,
        question_count: question_count.max(0) as usize,
    })
}

fn question_from_row(row: &Row<'_>) -> rusqlite::Result<QuestionRecord> {
    Ok(QuestionRecord {
        id: row.get(0)?,
        session_id: row.get(1)?,
        question_type: row.get(2)?,
        question_text: row.get(3)?,
        explanation: row.get(4)?,
        difficulty: row.get(5)?,
        confidence_score: row.get(6)?,
        options: json_column(row, 7)?,
        correct_answer: row.get(8)?,
        sample_answer: row.get(9)?,
        image_url: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

/// JSON 文本列
fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|text| {
        serde_json::from_str(&text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}
