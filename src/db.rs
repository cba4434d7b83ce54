use std::path::Path;

use anyhow::Result;
use rusqlite::Connection;

use crate::record::SurgeryRecord;

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS SurgerySchedule (
            ID               INTEGER PRIMARY KEY AUTOINCREMENT,
            Department       TEXT NOT NULL,
            Date             TEXT NOT NULL,
            BedNumber        TEXT NOT NULL,
            PatientName      TEXT NOT NULL,
            Gender           TEXT NOT NULL,
            Age              INTEGER NOT NULL,
            HospitalNumber   TEXT NOT NULL,
            Diagnosis        TEXT NOT NULL,
            Operation        TEXT NOT NULL,
            MainSurgeon      TEXT NOT NULL,
            Assistant        TEXT NOT NULL,
            AnesthesiaDoctor TEXT NOT NULL,
            AnesthesiaType   TEXT NOT NULL,
            PreOpPrep        TEXT,
            OperationOrder   INTEGER NOT NULL,
            Creator          TEXT NOT NULL,
            Editor           TEXT NOT NULL,
            CreatedAt        TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            UpdatedAt        TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );
        CREATE INDEX IF NOT EXISTS idx_schedule_day ON SurgerySchedule(Date, Department);
        ",
    )?;
    Ok(())
}

// ── Import ──

/// Extracted case plus the scheduling context the export does not carry.
pub struct NewSurgery {
    pub department: String,
    pub date: String,
    pub operation_order: i64,
    pub creator: String,
    pub record: SurgeryRecord,
}

/// First free slot in a ward's list for one day.
pub fn next_operation_order(conn: &Connection, date: &str, department: &str) -> Result<i64> {
    let next = conn.query_row(
        "SELECT COALESCE(MAX(OperationOrder), 0) + 1
         FROM SurgerySchedule WHERE Date = ?1 AND Department = ?2",
        rusqlite::params![date, department],
        |r| r.get(0),
    )?;
    Ok(next)
}

pub fn insert_surgeries(conn: &Connection, rows: &[NewSurgery]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO SurgerySchedule
             (Department, Date, BedNumber, PatientName, Gender, Age, HospitalNumber,
              Diagnosis, Operation, MainSurgeon, Assistant, AnesthesiaDoctor,
              AnesthesiaType, PreOpPrep, OperationOrder, Creator, Editor)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,'',?11,?12,'',?13,?14,?14)",
        )?;
        for s in rows {
            let r = &s.record;
            count += stmt.execute(rusqlite::params![
                s.department, s.date, r.bed_number, r.patient_name, r.gender, r.age,
                r.hospital_number, r.diagnosis, r.operation, r.main_surgeon,
                r.anesthesia_doctor, r.anesthesia_type, s.operation_order, s.creator,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

// ── Schedule ──

/// Editor recorded when an edit does not name one.
pub const DEFAULT_EDITOR: &str = "系统用户";

pub struct ScheduleRow {
    pub id: i64,
    pub department: String,
    pub date: String,
    pub operation_order: i64,
    pub assistant: String,
    pub pre_op_prep: String,
    pub editor: String,
    pub updated_at: String,
    pub record: SurgeryRecord,
}

const SCHEDULE_COLUMNS: &str = "ID, Department, Date, OperationOrder, Assistant, COALESCE(PreOpPrep,''),
    Editor, COALESCE(UpdatedAt,''), BedNumber, PatientName, Gender, Age, HospitalNumber,
    Diagnosis, Operation, MainSurgeon, AnesthesiaDoctor, AnesthesiaType";

fn schedule_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduleRow> {
    Ok(ScheduleRow {
        id: row.get(0)?,
        department: row.get(1)?,
        date: row.get(2)?,
        operation_order: row.get(3)?,
        assistant: row.get(4)?,
        pre_op_prep: row.get(5)?,
        editor: row.get(6)?,
        updated_at: row.get(7)?,
        record: SurgeryRecord {
            bed_number: row.get(8)?,
            patient_name: row.get(9)?,
            gender: row.get(10)?,
            age: row.get(11)?,
            hospital_number: row.get(12)?,
            diagnosis: row.get(13)?,
            operation: row.get(14)?,
            main_surgeon: row.get(15)?,
            anesthesia_doctor: row.get(16)?,
            anesthesia_type: row.get(17)?,
        },
    })
}

fn query_schedule(
    conn: &Connection,
    conditions: &[String],
    params: &[Box<dyn rusqlite::types::ToSql>],
    order_by: &str,
) -> Result<Vec<ScheduleRow>> {
    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    let sql = format!(
        "SELECT {} FROM SurgerySchedule{} ORDER BY {}",
        SCHEDULE_COLUMNS, where_clause, order_by
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), schedule_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn fetch_schedule(
    conn: &Connection,
    date: Option<&str>,
    department: Option<&str>,
) -> Result<Vec<ScheduleRow>> {
    let mut conditions = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(d) = date {
        conditions.push(format!("Date = ?{}", params.len() + 1));
        params.push(Box::new(d.to_string()));
    }
    if let Some(w) = department {
        conditions.push(format!("Department = ?{}", params.len() + 1));
        params.push(Box::new(w.to_string()));
    }

    query_schedule(conn, &conditions, &params, "Date, Department, OperationOrder")
}

pub fn fetch_surgery(conn: &Connection, id: i64) -> Result<Option<ScheduleRow>> {
    let params: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(id)];
    let rows = query_schedule(conn, &["ID = ?1".to_string()], &params, "ID")?;
    Ok(rows.into_iter().next())
}

/// A ward's surgeries between two dates (inclusive), grouped by day.
pub fn fetch_history(
    conn: &Connection,
    department: &str,
    start: &str,
    end: &str,
) -> Result<Vec<(String, Vec<ScheduleRow>)>> {
    let conditions = ["Department = ?1".to_string(), "Date BETWEEN ?2 AND ?3".to_string()];
    let params: Vec<Box<dyn rusqlite::types::ToSql>> = vec![
        Box::new(department.to_string()),
        Box::new(start.to_string()),
        Box::new(end.to_string()),
    ];
    let rows = query_schedule(conn, &conditions, &params, "Date, OperationOrder")?;

    let mut days: Vec<(String, Vec<ScheduleRow>)> = Vec::new();
    for row in rows {
        if days.last().map_or(true, |(date, _)| *date != row.date) {
            days.push((row.date.clone(), Vec::new()));
        }
        if let Some((_, group)) = days.last_mut() {
            group.push(row);
        }
    }
    Ok(days)
}

/// Overwrite every editable column of `row.id` and stamp the edit.
/// Returns false when no row had that id.
pub fn update_surgery(conn: &Connection, row: &ScheduleRow, editor: &str) -> Result<bool> {
    let r = &row.record;
    let n = conn.execute(
        "UPDATE SurgerySchedule
         SET Date=?1, BedNumber=?2, PatientName=?3, Gender=?4, Age=?5,
             HospitalNumber=?6, Diagnosis=?7, Operation=?8, MainSurgeon=?9,
             Assistant=?10, AnesthesiaDoctor=?11, AnesthesiaType=?12,
             PreOpPrep=?13, OperationOrder=?14, Editor=?15, UpdatedAt=CURRENT_TIMESTAMP
         WHERE ID=?16",
        rusqlite::params![
            row.date, r.bed_number, r.patient_name, r.gender, r.age,
            r.hospital_number, r.diagnosis, r.operation, r.main_surgeon,
            row.assistant, r.anesthesia_doctor, r.anesthesia_type,
            row.pre_op_prep, row.operation_order, editor, row.id,
        ],
    )?;
    Ok(n > 0)
}

/// Returns false when no row had that id.
pub fn delete_surgery(conn: &Connection, id: i64) -> Result<bool> {
    let n = conn.execute("DELETE FROM SurgerySchedule WHERE ID = ?1", [id])?;
    Ok(n > 0)
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub dates: usize,
    pub by_department: Vec<(String, usize)>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let total: usize = conn.query_row("SELECT COUNT(*) FROM SurgerySchedule", [], |r| r.get(0))?;
    let dates: usize = conn.query_row(
        "SELECT COUNT(DISTINCT Date) FROM SurgerySchedule",
        [],
        |r| r.get(0),
    )?;
    let mut stmt = conn.prepare(
        "SELECT Department, COUNT(*) FROM SurgerySchedule
         GROUP BY Department ORDER BY COUNT(*) DESC, Department",
    )?;
    let by_department = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Stats {
        total,
        dates,
        by_department,
    })
}
