//! Embedded SQLite store backing the [`Database`] trait.
//!
//! Every [`Database::transaction`] call runs as one `BEGIN IMMEDIATE` transaction, so
//! writers sharing a data file are serialized by SQLite itself and each transaction
//! reads what other processes committed before it began. File-backed stores use the
//! WAL journal and wait up to [`BUSY_TIMEOUT_MS`] for a competing writer.
//! Without a path the store is a private in-memory database.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use carebook_types::{Amount, NonEmptyText, Rating, ValueError};
use chrono::{NaiveDate, NaiveTime};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Params, Row, TransactionBehavior};

use super::{
    AppointmentRepository, AvailabilityRepository, ChatRepository, ConsultationRepository,
    Database, NotificationRepository, Page, PaymentRepository, ProviderRepository, Repositories,
    ReviewRepository, VisitRepository,
};
use crate::auth::Role;
use crate::constants::{
    APPOINTMENT, AVAILABILITY, BUSY_TIMEOUT_MS, CHAT_MESSAGE, CONSULTATION, DOCTOR,
    HOME_CARE_PROVIDER, HOME_CARE_VISIT, NOTIFICATION, PAYMENT, REVIEW,
};
use crate::models::{
    Appointment, AppointmentFilter, AppointmentStatus, ChatMessage, Consultation,
    ConsultationFilter, ConsultationStatus, Doctor, DoctorAvailability, EncounterRef,
    HomeCareProvider, HomeCareVisit, Notification, NotificationKind, Payment, PaymentStatus,
    ProviderFilter, ProviderRef, ProviderStatus, ProviderType, Review, VisitFilter, VisitStatus,
};
use crate::{CoreError, CoreResult};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS appointments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id INTEGER NOT NULL,
    provider_type TEXT NOT NULL,
    provider_id INTEGER NOT NULL,
    service_type_id INTEGER,
    date TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    status TEXT NOT NULL,
    cancellation_reason TEXT,
    version INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS appointments_provider_date
    ON appointments (provider_type, provider_id, date);

CREATE TABLE IF NOT EXISTS consultations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id INTEGER NOT NULL,
    doctor_id INTEGER NOT NULL,
    appointment_id INTEGER,
    consultation_type TEXT NOT NULL,
    notes TEXT,
    fee REAL,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    version INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS payments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    amount REAL NOT NULL,
    status TEXT NOT NULL,
    encounter_type TEXT NOT NULL,
    encounter_id INTEGER NOT NULL,
    payment_date TEXT NOT NULL,
    paid_at TEXT,
    refund_date TEXT,
    version INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS payments_encounter
    ON payments (encounter_type, encounter_id);

CREATE TABLE IF NOT EXISTS reviews (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id INTEGER NOT NULL,
    provider_type TEXT NOT NULL,
    provider_id INTEGER NOT NULL,
    encounter_type TEXT,
    encounter_id INTEGER,
    rating INTEGER NOT NULL,
    comment TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS doctor_availability (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    doctor_id INTEGER NOT NULL,
    day_of_week INTEGER NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS doctors (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    specialty TEXT NOT NULL,
    consultation_fee REAL,
    status TEXT NOT NULL,
    is_available INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS home_care_providers (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    hourly_rate REAL,
    status TEXT NOT NULL,
    is_available INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS home_care_visits (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id INTEGER NOT NULL,
    provider_id INTEGER NOT NULL,
    appointment_id INTEGER,
    visit_date TEXT NOT NULL,
    address TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    duration_hours REAL NOT NULL,
    special_requirements TEXT,
    status TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT,
    version INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    kind TEXT NOT NULL,
    message TEXT NOT NULL,
    is_read INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chat_messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    consultation_id INTEGER NOT NULL,
    sender_id INTEGER NOT NULL,
    sender_role TEXT NOT NULL,
    recipient_id INTEGER NOT NULL,
    message TEXT NOT NULL,
    sent_at TEXT NOT NULL,
    is_read INTEGER NOT NULL
);
";

const APPOINTMENT_SELECT: &str = "SELECT id, patient_id, provider_type, provider_id, \
    service_type_id, date, start_time, end_time, status, cancellation_reason, version, \
    created_at, updated_at FROM appointments";

const CONSULTATION_SELECT: &str = "SELECT id, patient_id, doctor_id, appointment_id, \
    consultation_type, notes, fee, status, started_at, completed_at, version, created_at, \
    updated_at FROM consultations";

const PAYMENT_SELECT: &str = "SELECT id, amount, status, encounter_type, encounter_id, \
    payment_date, paid_at, refund_date, version, created_at, updated_at FROM payments";

const REVIEW_SELECT: &str = "SELECT id, patient_id, provider_type, provider_id, \
    encounter_type, encounter_id, rating, comment, created_at, updated_at FROM reviews";

const AVAILABILITY_SELECT: &str =
    "SELECT id, doctor_id, day_of_week, start_time, end_time FROM doctor_availability";

const DOCTOR_SELECT: &str = "SELECT id, name, specialty, consultation_fee, status, \
    is_available, created_at, updated_at FROM doctors";

const HOME_CARE_PROVIDER_SELECT: &str = "SELECT id, name, hourly_rate, status, is_available, \
    created_at, updated_at FROM home_care_providers";

const VISIT_SELECT: &str = "SELECT id, patient_id, provider_id, appointment_id, visit_date, \
    address, latitude, longitude, duration_hours, special_requirements, status, started_at, \
    completed_at, version, created_at, updated_at FROM home_care_visits";

const NOTIFICATION_SELECT: &str =
    "SELECT id, user_id, kind, message, is_read, created_at FROM notifications";

const CHAT_MESSAGE_SELECT: &str = "SELECT id, consultation_id, sender_id, sender_role, \
    recipient_id, message, sent_at, is_read FROM chat_messages";

const CONSULTATION_ENCOUNTER: &str = "consultation";
const VISIT_ENCOUNTER: &str = "home_care_visit";

/// Stores the enum by its wire name.
macro_rules! text_column {
    ($($ty:ty),* $(,)?) => {$(
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: CoreError| FromSqlError::Other(Box::new(e)))
            }
        }
    )*};
}

text_column!(
    ProviderType,
    AppointmentStatus,
    ConsultationStatus,
    PaymentStatus,
    ProviderStatus,
    VisitStatus,
    NotificationKind,
    Role,
);

/// SQLite database, on disk or in memory.
#[derive(Debug)]
pub struct LocalDatabase {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl LocalDatabase {
    /// A store that lives only as long as the process.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Database` if SQLite cannot create the schema.
    pub fn in_memory() -> CoreResult<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    /// Opens the database file at `path`, creating it and its tables if needed.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::DataDir` if the parent directory cannot be created, and
    /// `CoreError::Database` if the file cannot be opened or is not a SQLite database.
    pub fn open(path: impl Into<PathBuf>) -> CoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(CoreError::DataDir)?;
        }

        let conn = Connection::open(&path)?;
        conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))?;
        let journal_mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::info!(
            path = %path.display(),
            journal_mode = %journal_mode,
            "opened data file"
        );

        Self::init(conn, Some(path))
    }

    /// Opens `path` when given, otherwise an in-memory store.
    pub fn from_data_file(path: Option<&Path>) -> CoreResult<Self> {
        match path {
            Some(path) => Self::open(path),
            None => Self::in_memory(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> CoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }
}

impl Database for LocalDatabase {
    fn transaction<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut dyn Repositories) -> CoreResult<T>,
    {
        let mut conn = self.conn.lock().map_err(|_| CoreError::LockPoisoned)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Dropping `tx` on the error path rolls back every write.
        let value = f(&mut LocalTx { conn: &tx })?;

        tx.commit().map_err(|e| {
            tracing::error!("failed to commit transaction: {:?}", e);
            CoreError::from(e)
        })?;
        Ok(value)
    }
}

/// The repositories of one open transaction.
struct LocalTx<'a> {
    conn: &'a Connection,
}

type RowMapper<T> = fn(&Row<'_>) -> rusqlite::Result<T>;

impl LocalTx<'_> {
    fn execute(&self, sql: &str, params: impl Params) -> CoreResult<usize> {
        Ok(self.conn.prepare_cached(sql)?.execute(params)?)
    }

    fn insert(&self, sql: &str, params: impl Params) -> CoreResult<i64> {
        self.execute(sql, params)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn one<T>(&self, sql: &str, params: impl Params, map: RowMapper<T>) -> CoreResult<Option<T>> {
        Ok(self.conn.prepare_cached(sql)?.query_row(params, map).optional()?)
    }

    fn many<T>(&self, sql: &str, params: impl Params, map: RowMapper<T>) -> CoreResult<Vec<T>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params, map)?;
        Ok(rows.collect::<rusqlite::Result<Vec<T>>>()?)
    }

    fn count(&self, sql: &str, params: impl Params) -> CoreResult<usize> {
        Ok(self.conn.prepare_cached(sql)?.query_row(params, |row| row.get(0))?)
    }

    /// Rows keyed by a caller-supplied id must not already exist.
    fn ensure_absent(&self, table: &str, entity: &'static str, id: i64) -> CoreResult<()> {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1)");
        let exists: bool = self.conn.prepare_cached(&sql)?.query_row([id], |row| row.get(0))?;
        if exists {
            return Err(CoreError::Conflict(format!("{entity} {id} already exists")));
        }
        Ok(())
    }

    /// Turns the outcome of an `UPDATE ... WHERE id = ? AND version = ?` into the new
    /// version, or explains why no row matched.
    fn next_version(
        &self,
        table: &str,
        entity: &'static str,
        id: i64,
        seen: u64,
        changed: usize,
    ) -> CoreResult<u64> {
        if changed > 0 {
            return Ok(seen + 1);
        }
        let sql = format!("SELECT version FROM {table} WHERE id = ?1");
        let stored: Option<u64> = self
            .conn
            .prepare_cached(&sql)?
            .query_row([id], |row| row.get(0))
            .optional()?;
        match stored {
            None => Err(CoreError::not_found(entity, id)),
            Some(current) => Err(CoreError::Conflict(format!(
                "{entity} {id} was modified concurrently (version {seen}, stored {current})"
            ))),
        }
    }
}

fn found(entity: &'static str, id: i64, changed: usize) -> CoreResult<()> {
    if changed == 0 {
        return Err(CoreError::not_found(entity, id));
    }
    Ok(())
}

/// `LIMIT` and `OFFSET` parameters; `Page::all` maps to SQLite's "no limit".
fn window(page: Page) -> (i64, i64) {
    (
        i64::try_from(page.limit).unwrap_or(-1),
        i64::try_from(page.offset).unwrap_or(i64::MAX),
    )
}

fn conversion(idx: usize, ty: Type, e: ValueError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(e))
}

fn text_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NonEmptyText> {
    NonEmptyText::new(row.get::<_, String>(idx)?).map_err(|e| conversion(idx, Type::Text, e))
}

fn amount_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Amount> {
    Amount::new(row.get(idx)?).map_err(|e| conversion(idx, Type::Real, e))
}

fn optional_amount_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Amount>> {
    row.get::<_, Option<f64>>(idx)?
        .map(Amount::new)
        .transpose()
        .map_err(|e| conversion(idx, Type::Real, e))
}

fn rating_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Rating> {
    Rating::new(row.get(idx)?).map_err(|e| conversion(idx, Type::Integer, e))
}

/// Reads a `(provider_type, provider_id)` column pair.
fn provider_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<ProviderRef> {
    let id = row.get(idx + 1)?;
    Ok(match row.get::<_, ProviderType>(idx)? {
        ProviderType::Doctor => ProviderRef::Doctor(id),
        ProviderType::HomeCareProvider => ProviderRef::HomeCareProvider(id),
    })
}

fn encounter_parts(encounter: EncounterRef) -> (&'static str, i64) {
    match encounter {
        EncounterRef::Consultation(id) => (CONSULTATION_ENCOUNTER, id),
        EncounterRef::HomeCareVisit(id) => (VISIT_ENCOUNTER, id),
    }
}

/// Reads an `(encounter_type, encounter_id)` column pair; both are NULL when unset.
fn encounter_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<EncounterRef>> {
    let kind: Option<String> = row.get(idx)?;
    let id: Option<i64> = row.get(idx + 1)?;
    match (kind.as_deref(), id) {
        (None, None) => Ok(None),
        (Some(CONSULTATION_ENCOUNTER), Some(id)) => Ok(Some(EncounterRef::Consultation(id))),
        (Some(VISIT_ENCOUNTER), Some(id)) => Ok(Some(EncounterRef::HomeCareVisit(id))),
        (kind, id) => Err(rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("invalid encounter reference ({kind:?}, {id:?})").into(),
        )),
    }
}

fn appointment_from_row(row: &Row<'_>) -> rusqlite::Result<Appointment> {
    Ok(Appointment {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        provider: provider_at(row, 2)?,
        service_type_id: row.get(4)?,
        date: row.get(5)?,
        start_time: row.get(6)?,
        end_time: row.get(7)?,
        status: row.get(8)?,
        cancellation_reason: row.get(9)?,
        version: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn consultation_from_row(row: &Row<'_>) -> rusqlite::Result<Consultation> {
    Ok(Consultation {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        appointment_id: row.get(3)?,
        consultation_type: text_at(row, 4)?,
        notes: row.get(5)?,
        fee: optional_amount_at(row, 6)?,
        status: row.get(7)?,
        started_at: row.get(8)?,
        completed_at: row.get(9)?,
        version: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn payment_from_row(row: &Row<'_>) -> rusqlite::Result<Payment> {
    let target = encounter_at(row, 3)?.ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(3, Type::Null, "payment without encounter".into())
    })?;
    Ok(Payment {
        id: row.get(0)?,
        amount: amount_at(row, 1)?,
        status: row.get(2)?,
        target,
        payment_date: row.get(5)?,
        paid_at: row.get(6)?,
        refund_date: row.get(7)?,
        version: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn review_from_row(row: &Row<'_>) -> rusqlite::Result<Review> {
    Ok(Review {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        provider: provider_at(row, 2)?,
        encounter: encounter_at(row, 4)?,
        rating: rating_at(row, 6)?,
        comment: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn availability_from_row(row: &Row<'_>) -> rusqlite::Result<DoctorAvailability> {
    Ok(DoctorAvailability {
        id: row.get(0)?,
        doctor_id: row.get(1)?,
        day_of_week: row.get(2)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
    })
}

fn doctor_from_row(row: &Row<'_>) -> rusqlite::Result<Doctor> {
    Ok(Doctor {
        id: row.get(0)?,
        name: text_at(row, 1)?,
        specialty: text_at(row, 2)?,
        consultation_fee: optional_amount_at(row, 3)?,
        status: row.get(4)?,
        is_available: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn home_care_provider_from_row(row: &Row<'_>) -> rusqlite::Result<HomeCareProvider> {
    Ok(HomeCareProvider {
        id: row.get(0)?,
        name: text_at(row, 1)?,
        hourly_rate: optional_amount_at(row, 2)?,
        status: row.get(3)?,
        is_available: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn visit_from_row(row: &Row<'_>) -> rusqlite::Result<HomeCareVisit> {
    Ok(HomeCareVisit {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        provider_id: row.get(2)?,
        appointment_id: row.get(3)?,
        visit_date: row.get(4)?,
        address: text_at(row, 5)?,
        latitude: row.get(6)?,
        longitude: row.get(7)?,
        duration_hours: row.get(8)?,
        special_requirements: row.get(9)?,
        status: row.get(10)?,
        started_at: row.get(11)?,
        completed_at: row.get(12)?,
        version: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        message: row.get(3)?,
        is_read: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn chat_message_from_row(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        id: row.get(0)?,
        consultation_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_role: row.get(3)?,
        recipient_id: row.get(4)?,
        message: text_at(row, 5)?,
        sent_at: row.get(6)?,
        is_read: row.get(7)?,
    })
}

impl AppointmentRepository for LocalTx<'_> {
    fn insert_appointment(&mut self, appointment: Appointment) -> CoreResult<Appointment> {
        let id = self.insert(
            "INSERT INTO appointments (patient_id, provider_type, provider_id, service_type_id, \
             date, start_time, end_time, status, cancellation_reason, version, created_at, \
             updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?11)",
            params![
                appointment.patient_id,
                appointment.provider.provider_type(),
                appointment.provider.id(),
                appointment.service_type_id,
                appointment.date,
                appointment.start_time,
                appointment.end_time,
                appointment.status,
                appointment.cancellation_reason,
                appointment.created_at,
                appointment.updated_at,
            ],
        )?;
        Ok(Appointment {
            id,
            version: 1,
            ..appointment
        })
    }

    fn appointment(&self, id: i64) -> CoreResult<Option<Appointment>> {
        self.one(
            &format!("{APPOINTMENT_SELECT} WHERE id = ?1"),
            [id],
            appointment_from_row,
        )
    }

    fn update_appointment(&mut self, appointment: Appointment) -> CoreResult<Appointment> {
        let changed = self.execute(
            "UPDATE appointments SET patient_id = ?1, provider_type = ?2, provider_id = ?3, \
             service_type_id = ?4, date = ?5, start_time = ?6, end_time = ?7, status = ?8, \
             cancellation_reason = ?9, created_at = ?10, updated_at = ?11, \
             version = version + 1 WHERE id = ?12 AND version = ?13",
            params![
                appointment.patient_id,
                appointment.provider.provider_type(),
                appointment.provider.id(),
                appointment.service_type_id,
                appointment.date,
                appointment.start_time,
                appointment.end_time,
                appointment.status,
                appointment.cancellation_reason,
                appointment.created_at,
                appointment.updated_at,
                appointment.id,
                appointment.version,
            ],
        )?;
        let version = self.next_version(
            "appointments",
            APPOINTMENT,
            appointment.id,
            appointment.version,
            changed,
        )?;
        Ok(Appointment {
            version,
            ..appointment
        })
    }

    fn delete_appointment(&mut self, id: i64) -> CoreResult<bool> {
        Ok(self.execute("DELETE FROM appointments WHERE id = ?1", [id])? > 0)
    }

    fn list_appointments(
        &self,
        filter: &AppointmentFilter,
        page: Page,
    ) -> CoreResult<Vec<Appointment>> {
        let (limit, offset) = window(page);
        self.many(
            &format!(
                "{APPOINTMENT_SELECT} WHERE (?1 IS NULL OR status = ?1) \
                 AND (?2 IS NULL OR provider_type = ?2) \
                 AND (?3 IS NULL OR (provider_type = ?3 AND provider_id = ?4)) \
                 AND (?5 IS NULL OR patient_id = ?5) \
                 AND (?6 IS NULL OR date >= ?6) AND (?7 IS NULL OR date <= ?7) \
                 ORDER BY date, start_time, id LIMIT ?8 OFFSET ?9"
            ),
            params![
                filter.status,
                filter.provider_type,
                filter.provider.map(ProviderRef::provider_type),
                filter.provider.map(ProviderRef::id),
                filter.patient_id,
                filter.date_from,
                filter.date_to,
                limit,
                offset,
            ],
            appointment_from_row,
        )
    }

    fn overlapping_appointments(
        &self,
        provider: ProviderRef,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        exclude_id: Option<i64>,
    ) -> CoreResult<Vec<Appointment>> {
        let same_day = self.many(
            &format!(
                "{APPOINTMENT_SELECT} WHERE provider_type = ?1 AND provider_id = ?2 \
                 AND date = ?3 AND status <> ?4 AND (?5 IS NULL OR id <> ?5) \
                 ORDER BY start_time, id"
            ),
            params![
                provider.provider_type(),
                provider.id(),
                date,
                AppointmentStatus::Cancelled,
                exclude_id,
            ],
            appointment_from_row,
        )?;
        Ok(same_day
            .into_iter()
            .filter(|a| a.overlaps(date, start, end))
            .collect())
    }
}

impl ConsultationRepository for LocalTx<'_> {
    fn insert_consultation(&mut self, consultation: Consultation) -> CoreResult<Consultation> {
        let id = self.insert(
            "INSERT INTO consultations (patient_id, doctor_id, appointment_id, \
             consultation_type, notes, fee, status, started_at, completed_at, version, \
             created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?11)",
            params![
                consultation.patient_id,
                consultation.doctor_id,
                consultation.appointment_id,
                consultation.consultation_type.as_str(),
                consultation.notes,
                consultation.fee.map(Amount::get),
                consultation.status,
                consultation.started_at,
                consultation.completed_at,
                consultation.created_at,
                consultation.updated_at,
            ],
        )?;
        Ok(Consultation {
            id,
            version: 1,
            ..consultation
        })
    }

    fn consultation(&self, id: i64) -> CoreResult<Option<Consultation>> {
        self.one(
            &format!("{CONSULTATION_SELECT} WHERE id = ?1"),
            [id],
            consultation_from_row,
        )
    }

    fn update_consultation(&mut self, consultation: Consultation) -> CoreResult<Consultation> {
        let changed = self.execute(
            "UPDATE consultations SET patient_id = ?1, doctor_id = ?2, appointment_id = ?3, \
             consultation_type = ?4, notes = ?5, fee = ?6, status = ?7, started_at = ?8, \
             completed_at = ?9, created_at = ?10, updated_at = ?11, \
             version = version + 1 WHERE id = ?12 AND version = ?13",
            params![
                consultation.patient_id,
                consultation.doctor_id,
                consultation.appointment_id,
                consultation.consultation_type.as_str(),
                consultation.notes,
                consultation.fee.map(Amount::get),
                consultation.status,
                consultation.started_at,
                consultation.completed_at,
                consultation.created_at,
                consultation.updated_at,
                consultation.id,
                consultation.version,
            ],
        )?;
        let version = self.next_version(
            "consultations",
            CONSULTATION,
            consultation.id,
            consultation.version,
            changed,
        )?;
        Ok(Consultation {
            version,
            ..consultation
        })
    }

    fn list_consultations(
        &self,
        filter: &ConsultationFilter,
        page: Page,
    ) -> CoreResult<Vec<Consultation>> {
        let (limit, offset) = window(page);
        self.many(
            &format!(
                "{CONSULTATION_SELECT} WHERE (?1 IS NULL OR patient_id = ?1) \
                 AND (?2 IS NULL OR doctor_id = ?2) AND (?3 IS NULL OR status = ?3) \
                 ORDER BY started_at DESC, id DESC LIMIT ?4 OFFSET ?5"
            ),
            params![
                filter.patient_id,
                filter.doctor_id,
                filter.status,
                limit,
                offset,
            ],
            consultation_from_row,
        )
    }

    fn consultation_for_appointment(
        &self,
        appointment_id: i64,
    ) -> CoreResult<Option<Consultation>> {
        self.one(
            &format!("{CONSULTATION_SELECT} WHERE appointment_id = ?1 ORDER BY id LIMIT 1"),
            [appointment_id],
            consultation_from_row,
        )
    }
}

impl PaymentRepository for LocalTx<'_> {
    fn insert_payment(&mut self, payment: Payment) -> CoreResult<Payment> {
        let (encounter_type, encounter_id) = encounter_parts(payment.target);
        let id = self.insert(
            "INSERT INTO payments (amount, status, encounter_type, encounter_id, payment_date, \
             paid_at, refund_date, version, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9)",
            params![
                payment.amount.get(),
                payment.status,
                encounter_type,
                encounter_id,
                payment.payment_date,
                payment.paid_at,
                payment.refund_date,
                payment.created_at,
                payment.updated_at,
            ],
        )?;
        Ok(Payment {
            id,
            version: 1,
            ..payment
        })
    }

    fn payment(&self, id: i64) -> CoreResult<Option<Payment>> {
        self.one(
            &format!("{PAYMENT_SELECT} WHERE id = ?1"),
            [id],
            payment_from_row,
        )
    }

    fn update_payment(&mut self, payment: Payment) -> CoreResult<Payment> {
        let (encounter_type, encounter_id) = encounter_parts(payment.target);
        let changed = self.execute(
            "UPDATE payments SET amount = ?1, status = ?2, encounter_type = ?3, \
             encounter_id = ?4, payment_date = ?5, paid_at = ?6, refund_date = ?7, \
             created_at = ?8, updated_at = ?9, version = version + 1 \
             WHERE id = ?10 AND version = ?11",
            params![
                payment.amount.get(),
                payment.status,
                encounter_type,
                encounter_id,
                payment.payment_date,
                payment.paid_at,
                payment.refund_date,
                payment.created_at,
                payment.updated_at,
                payment.id,
                payment.version,
            ],
        )?;
        let version =
            self.next_version("payments", PAYMENT, payment.id, payment.version, changed)?;
        Ok(Payment { version, ..payment })
    }

    fn payment_for(&self, target: EncounterRef) -> CoreResult<Option<Payment>> {
        let (encounter_type, encounter_id) = encounter_parts(target);
        self.one(
            &format!("{PAYMENT_SELECT} WHERE encounter_type = ?1 AND encounter_id = ?2"),
            params![encounter_type, encounter_id],
            payment_from_row,
        )
    }
}

impl ReviewRepository for LocalTx<'_> {
    fn insert_review(&mut self, review: Review) -> CoreResult<Review> {
        let encounter = review.encounter.map(encounter_parts);
        let id = self.insert(
            "INSERT INTO reviews (patient_id, provider_type, provider_id, encounter_type, \
             encounter_id, rating, comment, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                review.patient_id,
                review.provider.provider_type(),
                review.provider.id(),
                encounter.map(|(kind, _)| kind),
                encounter.map(|(_, id)| id),
                review.rating.get(),
                review.comment,
                review.created_at,
                review.updated_at,
            ],
        )?;
        Ok(Review { id, ..review })
    }

    fn review(&self, id: i64) -> CoreResult<Option<Review>> {
        self.one(
            &format!("{REVIEW_SELECT} WHERE id = ?1"),
            [id],
            review_from_row,
        )
    }

    fn update_review(&mut self, review: Review) -> CoreResult<Review> {
        let encounter = review.encounter.map(encounter_parts);
        let changed = self.execute(
            "UPDATE reviews SET patient_id = ?1, provider_type = ?2, provider_id = ?3, \
             encounter_type = ?4, encounter_id = ?5, rating = ?6, comment = ?7, \
             created_at = ?8, updated_at = ?9 WHERE id = ?10",
            params![
                review.patient_id,
                review.provider.provider_type(),
                review.provider.id(),
                encounter.map(|(kind, _)| kind),
                encounter.map(|(_, id)| id),
                review.rating.get(),
                review.comment,
                review.created_at,
                review.updated_at,
                review.id,
            ],
        )?;
        found(REVIEW, review.id, changed)?;
        Ok(review)
    }

    fn delete_review(&mut self, id: i64) -> CoreResult<bool> {
        Ok(self.execute("DELETE FROM reviews WHERE id = ?1", [id])? > 0)
    }

    fn list_reviews_for(&self, provider: ProviderRef, page: Page) -> CoreResult<Vec<Review>> {
        let (limit, offset) = window(page);
        self.many(
            &format!(
                "{REVIEW_SELECT} WHERE provider_type = ?1 AND provider_id = ?2 \
                 ORDER BY created_at DESC, id DESC LIMIT ?3 OFFSET ?4"
            ),
            params![provider.provider_type(), provider.id(), limit, offset],
            review_from_row,
        )
    }

    fn review_for_encounter(&self, encounter: EncounterRef) -> CoreResult<Option<Review>> {
        let (encounter_type, encounter_id) = encounter_parts(encounter);
        self.one(
            &format!(
                "{REVIEW_SELECT} WHERE encounter_type = ?1 AND encounter_id = ?2 \
                 ORDER BY id LIMIT 1"
            ),
            params![encounter_type, encounter_id],
            review_from_row,
        )
    }
}

impl AvailabilityRepository for LocalTx<'_> {
    fn insert_availability(
        &mut self,
        availability: DoctorAvailability,
    ) -> CoreResult<DoctorAvailability> {
        let id = self.insert(
            "INSERT INTO doctor_availability (doctor_id, day_of_week, start_time, end_time) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                availability.doctor_id,
                availability.day_of_week,
                availability.start_time,
                availability.end_time,
            ],
        )?;
        Ok(DoctorAvailability { id, ..availability })
    }

    fn availability(&self, id: i64) -> CoreResult<Option<DoctorAvailability>> {
        self.one(
            &format!("{AVAILABILITY_SELECT} WHERE id = ?1"),
            [id],
            availability_from_row,
        )
    }

    fn update_availability(
        &mut self,
        availability: DoctorAvailability,
    ) -> CoreResult<DoctorAvailability> {
        let changed = self.execute(
            "UPDATE doctor_availability SET doctor_id = ?1, day_of_week = ?2, \
             start_time = ?3, end_time = ?4 WHERE id = ?5",
            params![
                availability.doctor_id,
                availability.day_of_week,
                availability.start_time,
                availability.end_time,
                availability.id,
            ],
        )?;
        found(AVAILABILITY, availability.id, changed)?;
        Ok(availability)
    }

    fn delete_availability(&mut self, id: i64) -> CoreResult<bool> {
        Ok(self.execute("DELETE FROM doctor_availability WHERE id = ?1", [id])? > 0)
    }

    fn availability_for_doctor(&self, doctor_id: i64) -> CoreResult<Vec<DoctorAvailability>> {
        self.many(
            &format!(
                "{AVAILABILITY_SELECT} WHERE doctor_id = ?1 \
                 ORDER BY day_of_week, start_time, id"
            ),
            [doctor_id],
            availability_from_row,
        )
    }

    fn list_availability(&self, page: Page) -> CoreResult<Vec<DoctorAvailability>> {
        let (limit, offset) = window(page);
        self.many(
            &format!(
                "{AVAILABILITY_SELECT} ORDER BY doctor_id, day_of_week, start_time, id \
                 LIMIT ?1 OFFSET ?2"
            ),
            [limit, offset],
            availability_from_row,
        )
    }
}

impl ProviderRepository for LocalTx<'_> {
    fn insert_doctor(&mut self, doctor: Doctor) -> CoreResult<Doctor> {
        self.ensure_absent("doctors", DOCTOR, doctor.id)?;
        self.execute(
            "INSERT INTO doctors (id, name, specialty, consultation_fee, status, is_available, \
             created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                doctor.id,
                doctor.name.as_str(),
                doctor.specialty.as_str(),
                doctor.consultation_fee.map(Amount::get),
                doctor.status,
                doctor.is_available,
                doctor.created_at,
                doctor.updated_at,
            ],
        )?;
        Ok(doctor)
    }

    fn doctor(&self, id: i64) -> CoreResult<Option<Doctor>> {
        self.one(
            &format!("{DOCTOR_SELECT} WHERE id = ?1"),
            [id],
            doctor_from_row,
        )
    }

    fn update_doctor(&mut self, doctor: Doctor) -> CoreResult<Doctor> {
        let changed = self.execute(
            "UPDATE doctors SET name = ?1, specialty = ?2, consultation_fee = ?3, status = ?4, \
             is_available = ?5, created_at = ?6, updated_at = ?7 WHERE id = ?8",
            params![
                doctor.name.as_str(),
                doctor.specialty.as_str(),
                doctor.consultation_fee.map(Amount::get),
                doctor.status,
                doctor.is_available,
                doctor.created_at,
                doctor.updated_at,
                doctor.id,
            ],
        )?;
        found(DOCTOR, doctor.id, changed)?;
        Ok(doctor)
    }

    fn list_doctors(&self, filter: &ProviderFilter, page: Page) -> CoreResult<Vec<Doctor>> {
        let (limit, offset) = window(page);
        self.many(
            &format!(
                "{DOCTOR_SELECT} WHERE (?1 IS NULL OR status = ?1) \
                 AND (?2 IS NULL OR is_available = ?2) ORDER BY id LIMIT ?3 OFFSET ?4"
            ),
            params![filter.status, filter.is_available, limit, offset],
            doctor_from_row,
        )
    }

    fn insert_home_care_provider(
        &mut self,
        provider: HomeCareProvider,
    ) -> CoreResult<HomeCareProvider> {
        self.ensure_absent("home_care_providers", HOME_CARE_PROVIDER, provider.id)?;
        self.execute(
            "INSERT INTO home_care_providers (id, name, hourly_rate, status, is_available, \
             created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                provider.id,
                provider.name.as_str(),
                provider.hourly_rate.map(Amount::get),
                provider.status,
                provider.is_available,
                provider.created_at,
                provider.updated_at,
            ],
        )?;
        Ok(provider)
    }

    fn home_care_provider(&self, id: i64) -> CoreResult<Option<HomeCareProvider>> {
        self.one(
            &format!("{HOME_CARE_PROVIDER_SELECT} WHERE id = ?1"),
            [id],
            home_care_provider_from_row,
        )
    }

    fn update_home_care_provider(
        &mut self,
        provider: HomeCareProvider,
    ) -> CoreResult<HomeCareProvider> {
        let changed = self.execute(
            "UPDATE home_care_providers SET name = ?1, hourly_rate = ?2, status = ?3, \
             is_available = ?4, created_at = ?5, updated_at = ?6 WHERE id = ?7",
            params![
                provider.name.as_str(),
                provider.hourly_rate.map(Amount::get),
                provider.status,
                provider.is_available,
                provider.created_at,
                provider.updated_at,
                provider.id,
            ],
        )?;
        found(HOME_CARE_PROVIDER, provider.id, changed)?;
        Ok(provider)
    }

    fn list_home_care_providers(
        &self,
        filter: &ProviderFilter,
        page: Page,
    ) -> CoreResult<Vec<HomeCareProvider>> {
        let (limit, offset) = window(page);
        self.many(
            &format!(
                "{HOME_CARE_PROVIDER_SELECT} WHERE (?1 IS NULL OR status = ?1) \
                 AND (?2 IS NULL OR is_available = ?2) ORDER BY id LIMIT ?3 OFFSET ?4"
            ),
            params![filter.status, filter.is_available, limit, offset],
            home_care_provider_from_row,
        )
    }
}

impl VisitRepository for LocalTx<'_> {
    fn insert_visit(&mut self, visit: HomeCareVisit) -> CoreResult<HomeCareVisit> {
        let id = self.insert(
            "INSERT INTO home_care_visits (patient_id, provider_id, appointment_id, visit_date, \
             address, latitude, longitude, duration_hours, special_requirements, status, \
             started_at, completed_at, version, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 1, ?13, ?14)",
            params![
                visit.patient_id,
                visit.provider_id,
                visit.appointment_id,
                visit.visit_date,
                visit.address.as_str(),
                visit.latitude,
                visit.longitude,
                visit.duration_hours,
                visit.special_requirements,
                visit.status,
                visit.started_at,
                visit.completed_at,
                visit.created_at,
                visit.updated_at,
            ],
        )?;
        Ok(HomeCareVisit {
            id,
            version: 1,
            ..visit
        })
    }

    fn visit(&self, id: i64) -> CoreResult<Option<HomeCareVisit>> {
        self.one(&format!("{VISIT_SELECT} WHERE id = ?1"), [id], visit_from_row)
    }

    fn update_visit(&mut self, visit: HomeCareVisit) -> CoreResult<HomeCareVisit> {
        let changed = self.execute(
            "UPDATE home_care_visits SET patient_id = ?1, provider_id = ?2, \
             appointment_id = ?3, visit_date = ?4, address = ?5, latitude = ?6, \
             longitude = ?7, duration_hours = ?8, special_requirements = ?9, status = ?10, \
             started_at = ?11, completed_at = ?12, created_at = ?13, updated_at = ?14, \
             version = version + 1 WHERE id = ?15 AND version = ?16",
            params![
                visit.patient_id,
                visit.provider_id,
                visit.appointment_id,
                visit.visit_date,
                visit.address.as_str(),
                visit.latitude,
                visit.longitude,
                visit.duration_hours,
                visit.special_requirements,
                visit.status,
                visit.started_at,
                visit.completed_at,
                visit.created_at,
                visit.updated_at,
                visit.id,
                visit.version,
            ],
        )?;
        let version = self.next_version(
            "home_care_visits",
            HOME_CARE_VISIT,
            visit.id,
            visit.version,
            changed,
        )?;
        Ok(HomeCareVisit { version, ..visit })
    }

    fn delete_visit(&mut self, id: i64) -> CoreResult<bool> {
        Ok(self.execute("DELETE FROM home_care_visits WHERE id = ?1", [id])? > 0)
    }

    fn list_visits(&self, filter: &VisitFilter, page: Page) -> CoreResult<Vec<HomeCareVisit>> {
        let (limit, offset) = window(page);
        self.many(
            &format!(
                "{VISIT_SELECT} WHERE (?1 IS NULL OR patient_id = ?1) \
                 AND (?2 IS NULL OR provider_id = ?2) AND (?3 IS NULL OR status = ?3) \
                 AND (?4 IS NULL OR visit_date >= ?4) AND (?5 IS NULL OR visit_date <= ?5) \
                 ORDER BY id DESC LIMIT ?6 OFFSET ?7"
            ),
            params![
                filter.patient_id,
                filter.provider_id,
                filter.status,
                filter.date_from,
                filter.date_to,
                limit,
                offset,
            ],
            visit_from_row,
        )
    }

    fn visit_for_appointment(&self, appointment_id: i64) -> CoreResult<Option<HomeCareVisit>> {
        self.one(
            &format!("{VISIT_SELECT} WHERE appointment_id = ?1 ORDER BY id LIMIT 1"),
            [appointment_id],
            visit_from_row,
        )
    }
}

impl NotificationRepository for LocalTx<'_> {
    fn insert_notification(&mut self, notification: Notification) -> CoreResult<Notification> {
        let id = self.insert(
            "INSERT INTO notifications (user_id, kind, message, is_read, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                notification.user_id,
                notification.kind,
                notification.message,
                notification.is_read,
                notification.created_at,
            ],
        )?;
        Ok(Notification { id, ..notification })
    }

    fn notification(&self, id: i64) -> CoreResult<Option<Notification>> {
        self.one(
            &format!("{NOTIFICATION_SELECT} WHERE id = ?1"),
            [id],
            notification_from_row,
        )
    }

    fn update_notification(&mut self, notification: Notification) -> CoreResult<Notification> {
        let changed = self.execute(
            "UPDATE notifications SET user_id = ?1, kind = ?2, message = ?3, is_read = ?4, \
             created_at = ?5 WHERE id = ?6",
            params![
                notification.user_id,
                notification.kind,
                notification.message,
                notification.is_read,
                notification.created_at,
                notification.id,
            ],
        )?;
        found(NOTIFICATION, notification.id, changed)?;
        Ok(notification)
    }

    fn notifications_for(&self, user_id: i64, page: Page) -> CoreResult<Vec<Notification>> {
        let (limit, offset) = window(page);
        self.many(
            &format!(
                "{NOTIFICATION_SELECT} WHERE user_id = ?1 \
                 ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
            ),
            [user_id, limit, offset],
            notification_from_row,
        )
    }

    fn unread_notification_count(&self, user_id: i64) -> CoreResult<usize> {
        self.count(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
            [user_id],
        )
    }
}

impl ChatRepository for LocalTx<'_> {
    fn insert_message(&mut self, message: ChatMessage) -> CoreResult<ChatMessage> {
        let id = self.insert(
            "INSERT INTO chat_messages (consultation_id, sender_id, sender_role, recipient_id, \
             message, sent_at, is_read) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                message.consultation_id,
                message.sender_id,
                message.sender_role,
                message.recipient_id,
                message.message.as_str(),
                message.sent_at,
                message.is_read,
            ],
        )?;
        Ok(ChatMessage { id, ..message })
    }

    fn message(&self, id: i64) -> CoreResult<Option<ChatMessage>> {
        self.one(
            &format!("{CHAT_MESSAGE_SELECT} WHERE id = ?1"),
            [id],
            chat_message_from_row,
        )
    }

    fn update_message(&mut self, message: ChatMessage) -> CoreResult<ChatMessage> {
        let changed = self.execute(
            "UPDATE chat_messages SET consultation_id = ?1, sender_id = ?2, sender_role = ?3, \
             recipient_id = ?4, message = ?5, sent_at = ?6, is_read = ?7 WHERE id = ?8",
            params![
                message.consultation_id,
                message.sender_id,
                message.sender_role,
                message.recipient_id,
                message.message.as_str(),
                message.sent_at,
                message.is_read,
                message.id,
            ],
        )?;
        found(CHAT_MESSAGE, message.id, changed)?;
        Ok(message)
    }

    fn messages_for(&self, consultation_id: i64, page: Page) -> CoreResult<Vec<ChatMessage>> {
        let (limit, offset) = window(page);
        self.many(
            &format!(
                "{CHAT_MESSAGE_SELECT} WHERE consultation_id = ?1 \
                 ORDER BY sent_at DESC, id DESC LIMIT ?2 OFFSET ?3"
            ),
            [consultation_id, limit, offset],
            chat_message_from_row,
        )
    }

    fn unread_message_count(&self, user_id: i64) -> CoreResult<usize> {
        self.count(
            "SELECT COUNT(*) FROM chat_messages WHERE recipient_id = ?1 AND is_read = 0",
            [user_id],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn appointment(start: (u32, u32), end: (u32, u32)) -> Appointment {
        Appointment {
            id: 0,
            patient_id: 1,
            provider: ProviderRef::Doctor(10),
            service_type_id: None,
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            status: AppointmentStatus::Scheduled,
            cancellation_reason: None,
            version: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn doctor(id: i64) -> Doctor {
        Doctor {
            id,
            name: NonEmptyText::new("Dr Who").unwrap(),
            specialty: NonEmptyText::new("general").unwrap(),
            consultation_fee: None,
            status: ProviderStatus::Active,
            is_available: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn memory() -> LocalDatabase {
        LocalDatabase::in_memory().expect("in-memory store should open")
    }

    #[test]
    fn insert_assigns_sequential_ids_and_first_version() {
        let db = memory();
        let (a, b) = db
            .transaction(|tx| {
                let a = tx.insert_appointment(appointment((9, 0), (9, 30)))?;
                let b = tx.insert_appointment(appointment((10, 0), (10, 30)))?;
                Ok((a, b))
            })
            .expect("insert should succeed");
        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(a.version, 1);
    }

    #[test]
    fn stored_rows_read_back_unchanged() {
        let db = memory();
        let stored = db
            .transaction(|tx| {
                let mut booking = appointment((9, 0), (9, 30));
                booking.provider = ProviderRef::HomeCareProvider(20);
                booking.service_type_id = Some(4);
                tx.insert_appointment(booking)
            })
            .expect("insert should succeed");

        let read = db
            .transaction(|tx| tx.appointment(stored.id))
            .expect("read should succeed");
        assert_eq!(read, Some(stored));
    }

    #[test]
    fn failed_transaction_rolls_back_every_write() {
        let db = memory();
        let result: CoreResult<()> = db.transaction(|tx| {
            tx.insert_appointment(appointment((9, 0), (9, 30)))?;
            tx.insert_doctor(doctor(10))?;
            Err(CoreError::InvalidState("abort".into()))
        });
        assert!(matches!(result, Err(CoreError::InvalidState(_))));

        db.transaction(|tx| {
            assert!(tx.appointment(1)?.is_none());
            assert!(tx.doctor(10)?.is_none());
            Ok(())
        })
        .expect("read should succeed");
    }

    #[test]
    fn stale_version_is_rejected() {
        let db = memory();
        let stored = db
            .transaction(|tx| tx.insert_appointment(appointment((9, 0), (9, 30))))
            .expect("insert should succeed");

        let updated = db
            .transaction(|tx| tx.update_appointment(stored.clone()))
            .expect("first update should succeed");
        assert_eq!(updated.version, 2);

        let err = db
            .transaction(|tx| tx.update_appointment(stored))
            .expect_err("stale update");
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn updating_a_missing_row_is_not_found() {
        let db = memory();
        let mut ghost = appointment((9, 0), (9, 30));
        ghost.id = 42;
        let err = db
            .transaction(|tx| tx.update_appointment(ghost))
            .expect_err("missing row");
        assert!(matches!(err, CoreError::NotFound { id: 42, .. }));

        let err = db
            .transaction(|tx| tx.update_doctor(doctor(7)))
            .expect_err("missing doctor");
        assert!(matches!(err, CoreError::NotFound { id: 7, .. }));
    }

    #[test]
    fn overlap_ignores_cancelled_and_touching_bookings() {
        let db = memory();
        db.transaction(|tx| {
            tx.insert_appointment(appointment((9, 0), (9, 30)))?;
            let mut cancelled = appointment((10, 0), (10, 30));
            cancelled.status = AppointmentStatus::Cancelled;
            tx.insert_appointment(cancelled)?;
            Ok(())
        })
        .expect("insert should succeed");

        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        db.transaction(|tx| {
            let provider = ProviderRef::Doctor(10);
            assert_eq!(
                tx.overlapping_appointments(provider, date, t(9, 15), t(9, 45), None)?
                    .len(),
                1
            );
            assert!(tx
                .overlapping_appointments(provider, date, t(9, 30), t(10, 0), None)?
                .is_empty());
            assert!(tx
                .overlapping_appointments(provider, date, t(10, 0), t(10, 30), None)?
                .is_empty());
            assert!(tx
                .overlapping_appointments(provider, date, t(9, 0), t(9, 30), Some(1))?
                .is_empty());
            let home = ProviderRef::HomeCareProvider(10);
            assert!(tx
                .overlapping_appointments(home, date, t(9, 0), t(9, 30), None)?
                .is_empty());
            Ok(())
        })
        .expect("query should succeed");
    }

    #[test]
    fn appointment_filter_and_window_apply() {
        let db = memory();
        db.transaction(|tx| {
            tx.insert_appointment(appointment((11, 0), (11, 30)))?;
            tx.insert_appointment(appointment((9, 0), (9, 30)))?;
            let mut other = appointment((10, 0), (10, 30));
            other.patient_id = 2;
            tx.insert_appointment(other)?;
            Ok(())
        })
        .expect("insert should succeed");

        let filter = AppointmentFilter {
            patient_id: Some(1),
            ..AppointmentFilter::default()
        };
        let ids: Vec<i64> = db
            .transaction(|tx| tx.list_appointments(&filter, Page::all()))
            .expect("list should succeed")
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![2, 1]);

        let second = db
            .transaction(|tx| {
                tx.list_appointments(&AppointmentFilter::default(), Page { offset: 1, limit: 1 })
            })
            .expect("list should succeed");
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, 3);
    }

    #[test]
    fn keyed_insert_rejects_duplicates() {
        let db = memory();
        db.transaction(|tx| tx.insert_doctor(doctor(10)))
            .expect("first insert should succeed");
        let err = db
            .transaction(|tx| tx.insert_doctor(doctor(10)))
            .expect_err("duplicate doctor");
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn file_backed_store_survives_reopen() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("data").join("carebook.db");

        {
            let db = LocalDatabase::open(&path).expect("open should succeed");
            db.transaction(|tx| {
                tx.insert_doctor(doctor(10))?;
                tx.insert_appointment(appointment((9, 0), (9, 30)))
            })
            .expect("insert should succeed");
        }
        assert!(path.exists());

        let db = LocalDatabase::open(&path).expect("reopen should succeed");
        let (doctor, appointment, next) = db
            .transaction(|tx| {
                let doctor = tx.doctor(10)?;
                let appointment = tx.appointment(1)?;
                let next = tx.insert_appointment(appointment_fixture())?;
                Ok((doctor, appointment, next))
            })
            .expect("read should succeed");
        assert!(doctor.is_some());
        assert_eq!(appointment.map(|a| a.start_time.to_string()), Some("09:00:00".into()));
        assert_eq!(next.id, 2);
    }

    fn appointment_fixture() -> Appointment {
        appointment((11, 0), (11, 30))
    }

    #[test]
    fn handles_on_one_file_see_each_others_writes() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("carebook.db");
        let server = LocalDatabase::open(&path).expect("open should succeed");
        let cli = LocalDatabase::open(&path).expect("second open should succeed");

        server
            .transaction(|tx| tx.insert_doctor(doctor(10)))
            .expect("server insert should succeed");
        cli.transaction(|tx| tx.insert_doctor(doctor(11)))
            .expect("cli insert should succeed");
        server
            .transaction(|tx| tx.insert_appointment(appointment((9, 0), (9, 30))))
            .expect("server booking should succeed");

        let seen_by_server = server
            .transaction(|tx| Ok((tx.doctor(10)?, tx.doctor(11)?)))
            .expect("read should succeed");
        assert!(seen_by_server.0.is_some() && seen_by_server.1.is_some());

        drop(server);
        drop(cli);
        let reopened = LocalDatabase::open(&path).expect("reopen should succeed");
        let (ten, eleven, booking) = reopened
            .transaction(|tx| Ok((tx.doctor(10)?, tx.doctor(11)?, tx.appointment(1)?)))
            .expect("read should succeed");
        assert!(ten.is_some());
        assert!(eleven.is_some());
        assert!(booking.is_some());
    }

    #[test]
    fn stale_handle_cannot_overwrite_a_newer_version() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("carebook.db");
        let first = LocalDatabase::open(&path).expect("open should succeed");
        let second = LocalDatabase::open(&path).expect("second open should succeed");

        let stored = first
            .transaction(|tx| tx.insert_appointment(appointment((9, 0), (9, 30))))
            .expect("insert should succeed");
        second
            .transaction(|tx| tx.update_appointment(stored.clone()))
            .expect("update through the second handle should succeed");

        let err = first
            .transaction(|tx| tx.update_appointment(stored))
            .expect_err("stale update");
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn non_database_file_is_reported() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("carebook.db");
        fs::write(&path, vec![b'x'; 8192]).expect("Failed to write file");

        let err = LocalDatabase::open(&path).expect_err("not a database");
        assert!(matches!(err, CoreError::Database(_)));
    }

    #[test]
    fn visits_list_newest_first() {
        let db = memory();
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let visit = HomeCareVisit {
            id: 0,
            patient_id: 1,
            provider_id: 3,
            appointment_id: None,
            visit_date: date,
            address: NonEmptyText::new("1 High St").unwrap(),
            latitude: 0.0,
            longitude: 0.0,
            duration_hours: 1.0,
            special_requirements: None,
            status: VisitStatus::Scheduled,
            started_at: None,
            completed_at: None,
            version: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let ids: Vec<i64> = db
            .transaction(|tx| {
                tx.insert_visit(visit.clone())?;
                tx.insert_visit(visit.clone())?;
                tx.insert_visit(visit)?;
                tx.list_visits(&VisitFilter::default(), Page { offset: 0, limit: 2 })
            })
            .expect("list should succeed")
            .into_iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[test]
    fn encounter_references_round_trip_through_columns() {
        let db = memory();
        let review = Review {
            id: 0,
            patient_id: 1,
            provider: ProviderRef::HomeCareProvider(20),
            encounter: Some(EncounterRef::HomeCareVisit(5)),
            rating: Rating::new(4).unwrap(),
            comment: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let (found, missing) = db
            .transaction(|tx| {
                tx.insert_review(review.clone())?;
                Ok((
                    tx.review_for_encounter(EncounterRef::HomeCareVisit(5))?,
                    tx.review_for_encounter(EncounterRef::Consultation(5))?,
                ))
            })
            .expect("review queries should succeed");
        assert_eq!(found.map(|r| r.rating.get()), Some(4));
        assert!(missing.is_none());
    }
}
