use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlparser::ast::{
    self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value,
    ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::engine::{PropertyFilter, PropertyPatch};
use crate::model::{DateRange, PaymentMethod};

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertProperty {
        host: Ulid,
        title: String,
        price_per_night: Decimal,
        max_guests: u32,
        category: Option<String>,
        available_from: Option<NaiveDate>,
        available_to: Option<NaiveDate>,
    },
    UpdateProperty {
        id: Ulid,
        actor: Ulid,
        patch: PropertyPatch,
    },
    DeleteProperty {
        id: Ulid,
        actor: Ulid,
    },
    InsertBlockedDates {
        property_id: Ulid,
        actor: Ulid,
        dates: Vec<NaiveDate>,
    },
    DeleteBlockedDates {
        property_id: Ulid,
        actor: Ulid,
        dates: Vec<NaiveDate>,
    },
    InsertBooking {
        property_id: Ulid,
        guest: Ulid,
        range: DateRange,
        payment_method: PaymentMethod,
    },
    /// `UPDATE bookings SET is_paid = true WHERE session_ref = '...'`
    ConfirmPayment {
        session_ref: String,
    },
    /// `UPDATE bookings SET status = 'canceled' WHERE id = ... AND guest = ...`
    CancelBooking {
        id: Ulid,
        actor: Ulid,
    },
    InsertWaitlist {
        property_id: Ulid,
        guest: Ulid,
    },
    /// `UPDATE waitlist SET confirmed = true WHERE id = ... AND guest = ...`
    ConfirmWaitlist {
        id: Ulid,
        actor: Ulid,
    },
    WithdrawWaitlist {
        id: Ulid,
        actor: Ulid,
    },
    InsertConversation {
        property_id: Ulid,
        guest: Ulid,
    },
    InsertMessage {
        conversation_id: Ulid,
        sender: Ulid,
        content: String,
    },
    SelectProperties {
        filter: PropertyFilter,
    },
    SelectAvailability {
        property_id: Ulid,
        range: DateRange,
    },
    SelectBookings {
        property_id: Option<Ulid>,
        guest: Option<Ulid>,
        session_ref: Option<String>,
    },
    SelectWaitlist {
        property_id: Ulid,
    },
    SelectMessages {
        conversation_id: Ulid,
        actor: Ulid,
    },
    Listen {
        channel: String,
    },
    Unlisten {
        channel: String,
    },
    UnlistenAll,
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let trimmed = sql.trim();
    let upper = trimmed.to_uppercase();
    if upper.starts_with("LISTEN ") {
        let channel = trimmed[7..].trim().trim_matches(';').to_string();
        return Ok(Command::Listen { channel });
    }
    if upper.starts_with("UNLISTEN ") {
        let channel = trimmed[9..].trim().trim_matches(';').to_string();
        if channel == "*" {
            return Ok(Command::UnlistenAll);
        }
        return Ok(Command::Unlisten { channel });
    }

    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Update { table, assignments, selection, .. } => {
            parse_update(table, assignments, selection)
        }
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

// ── INSERT ────────────────────────────────────────────────────

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let rows = named_insert_rows(insert)?;
    let row = &rows[0];

    match table.as_str() {
        "properties" => Ok(Command::InsertProperty {
            host: require_ulid(row, "host")?,
            title: require_string(row, "title")?,
            price_per_night: require_decimal(row, "price_per_night")?,
            max_guests: optional_u32(row, "max_guests")?.unwrap_or(1),
            category: optional_string(row, "category")?,
            available_from: optional_date(row, "available_from")?,
            available_to: optional_date(row, "available_to")?,
        }),
        "blocked_dates" => {
            let property_id = require_ulid(row, "property_id")?;
            let actor = require_ulid(row, "host")?;
            let mut dates = Vec::with_capacity(rows.len());
            for (i, r) in rows.iter().enumerate() {
                if require_ulid(r, "property_id")? != property_id {
                    return Err(SqlError::Parse(format!(
                        "row {i}: all rows must target one property"
                    )));
                }
                dates.push(require_date(r, "date")?);
            }
            Ok(Command::InsertBlockedDates { property_id, actor, dates })
        }
        "bookings" => {
            let check_in = require_date(row, "check_in")?;
            let check_out = require_date(row, "check_out")?;
            Ok(Command::InsertBooking {
                property_id: require_ulid(row, "property_id")?,
                guest: require_ulid(row, "guest")?,
                range: DateRange::new(check_in, check_out),
                payment_method: match optional_string(row, "payment_method")?.as_deref() {
                    None | Some("card") => PaymentMethod::Card,
                    Some("transfer") => PaymentMethod::Transfer,
                    Some(other) => {
                        return Err(SqlError::Parse(format!("bad payment_method: {other}")));
                    }
                },
            })
        }
        "waitlist" => Ok(Command::InsertWaitlist {
            property_id: require_ulid(row, "property_id")?,
            guest: require_ulid(row, "guest")?,
        }),
        "conversations" => Ok(Command::InsertConversation {
            property_id: require_ulid(row, "property_id")?,
            guest: require_ulid(row, "guest")?,
        }),
        "messages" => Ok(Command::InsertMessage {
            conversation_id: require_ulid(row, "conversation_id")?,
            sender: require_ulid(row, "sender")?,
            content: require_string(row, "content")?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── UPDATE ────────────────────────────────────────────────────

fn parse_update(
    table: &ast::TableWithJoins,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(&table.relation)?;
    let sets = assignment_map(assignments)?;
    let filters = eq_filters(selection)?;

    match table.as_str() {
        "properties" => {
            let patch = PropertyPatch {
                price_per_night: match sets.get("price_per_night") {
                    Some(e) => Some(parse_decimal_expr(e)?),
                    None => None,
                },
                max_guests: match sets.get("max_guests") {
                    Some(e) => Some(parse_u32(e)?),
                    None => None,
                },
                available_from: match sets.get("available_from") {
                    Some(e) => Some(parse_date_or_null(e)?),
                    None => None,
                },
                available_to: match sets.get("available_to") {
                    Some(e) => Some(parse_date_or_null(e)?),
                    None => None,
                },
                is_available: match sets.get("is_available") {
                    Some(e) => Some(parse_bool(e)?),
                    None => None,
                },
            };
            Ok(Command::UpdateProperty {
                id: filter_ulid(&filters, "id")?,
                actor: filter_ulid(&filters, "host")?,
                patch,
            })
        }
        "bookings" => {
            if let Some(e) = sets.get("is_paid") {
                if !parse_bool(e)? {
                    return Err(SqlError::Unsupported("can only set is_paid = true".into()));
                }
                return Ok(Command::ConfirmPayment {
                    session_ref: filter_string(&filters, "session_ref")?,
                });
            }
            if let Some(e) = sets.get("status") {
                let status = parse_string(e)?;
                if status != "canceled" {
                    return Err(SqlError::Unsupported(format!(
                        "can only set status = 'canceled', got '{status}'"
                    )));
                }
                return Ok(Command::CancelBooking {
                    id: filter_ulid(&filters, "id")?,
                    actor: filter_ulid(&filters, "guest")?,
                });
            }
            Err(SqlError::Unsupported("UPDATE bookings: unknown column".into()))
        }
        "waitlist" => {
            let Some(e) = sets.get("confirmed") else {
                return Err(SqlError::Unsupported("UPDATE waitlist: unknown column".into()));
            };
            if !parse_bool(e)? {
                return Err(SqlError::Unsupported("can only set confirmed = true".into()));
            }
            Ok(Command::ConfirmWaitlist {
                id: filter_ulid(&filters, "id")?,
                actor: filter_ulid(&filters, "guest")?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── DELETE ────────────────────────────────────────────────────

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let filters = eq_filters(&delete.selection)?;

    match table.as_str() {
        "properties" => Ok(Command::DeleteProperty {
            id: filter_ulid(&filters, "id")?,
            actor: filter_ulid(&filters, "host")?,
        }),
        "blocked_dates" => {
            let mut dates = date_list(&delete.selection)?;
            if let Some(e) = filters.get("date") {
                dates.push(parse_date_expr(e)?);
            }
            if dates.is_empty() {
                return Err(SqlError::MissingFilter("date"));
            }
            Ok(Command::DeleteBlockedDates {
                property_id: filter_ulid(&filters, "property_id")?,
                actor: filter_ulid(&filters, "host")?,
                dates,
            })
        }
        "waitlist" => Ok(Command::WithdrawWaitlist {
            id: filter_ulid(&filters, "id")?,
            actor: filter_ulid(&filters, "guest")?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── SELECT ────────────────────────────────────────────────────

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;
    let filters = eq_filters(&select.selection)?;

    match table.as_str() {
        "properties" => {
            let mut filter = PropertyFilter {
                category: match filters.get("category") {
                    Some(e) => Some(parse_string(e)?),
                    None => None,
                },
                ..Default::default()
            };
            if let Some(selection) = &select.selection {
                extract_property_ranges(selection, &mut filter)?;
            }
            let check_in = match filters.get("check_in") {
                Some(e) => Some(parse_date_expr(e)?),
                None => None,
            };
            let check_out = match filters.get("check_out") {
                Some(e) => Some(parse_date_expr(e)?),
                None => None,
            };
            filter.range = match (check_in, check_out) {
                (Some(ci), Some(co)) => Some(DateRange::new(ci, co)),
                (None, None) => None,
                _ => return Err(SqlError::MissingFilter("check_in and check_out")),
            };
            Ok(Command::SelectProperties { filter })
        }
        "availability" => {
            let check_in = filters
                .get("check_in")
                .ok_or(SqlError::MissingFilter("check_in"))
                .and_then(parse_date_expr)?;
            let check_out = filters
                .get("check_out")
                .ok_or(SqlError::MissingFilter("check_out"))
                .and_then(parse_date_expr)?;
            Ok(Command::SelectAvailability {
                property_id: filter_ulid(&filters, "property_id")?,
                range: DateRange::new(check_in, check_out),
            })
        }
        "bookings" => {
            let cmd = Command::SelectBookings {
                property_id: match filters.get("property_id") {
                    Some(e) => Some(parse_ulid_expr(e)?),
                    None => None,
                },
                guest: match filters.get("guest") {
                    Some(e) => Some(parse_ulid_expr(e)?),
                    None => None,
                },
                session_ref: match filters.get("session_ref") {
                    Some(e) => Some(parse_string(e)?),
                    None => None,
                },
            };
            if let Command::SelectBookings {
                property_id: None,
                guest: None,
                session_ref: None,
            } = cmd
            {
                return Err(SqlError::MissingFilter("property_id, guest or session_ref"));
            }
            Ok(cmd)
        }
        "waitlist" => Ok(Command::SelectWaitlist {
            property_id: filter_ulid(&filters, "property_id")?,
        }),
        "messages" => Ok(Command::SelectMessages {
            conversation_id: filter_ulid(&filters, "conversation_id")?,
            actor: filter_ulid(&filters, "participant")?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// Pull `price_per_night >=/<=` and `max_guests >=` out of the WHERE tree.
fn extract_property_ranges(expr: &Expr, filter: &mut PropertyFilter) -> Result<(), SqlError> {
    if let Expr::BinaryOp { left, op, right } = expr {
        match op {
            ast::BinaryOperator::And => {
                extract_property_ranges(left, filter)?;
                extract_property_ranges(right, filter)?;
            }
            ast::BinaryOperator::GtEq => match expr_column_name(left).as_deref() {
                Some("price_per_night") => filter.min_price = Some(parse_decimal_expr(right)?),
                Some("max_guests") => filter.guests = Some(parse_u32(right)?),
                _ => {}
            },
            ast::BinaryOperator::LtEq => {
                if expr_column_name(left).as_deref() == Some("price_per_night") {
                    filter.max_price = Some(parse_decimal_expr(right)?);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

/// Zip the INSERT column list with each VALUES row.
fn named_insert_rows(insert: &ast::Insert) -> Result<Vec<HashMap<String, Expr>>, SqlError> {
    if insert.columns.is_empty() {
        return Err(SqlError::Parse("INSERT requires an explicit column list".into()));
    }
    let columns: Vec<String> = insert.columns.iter().map(|c| c.value.to_lowercase()).collect();
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    let rows = match body.body.as_ref() {
        SetExpr::Values(values) if !values.rows.is_empty() => &values.rows,
        SetExpr::Values(_) => return Err(SqlError::Parse("empty VALUES".into())),
        _ => return Err(SqlError::Parse("expected VALUES".into())),
    };

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        if row.len() != columns.len() {
            return Err(SqlError::WrongArity("row", columns.len(), row.len()));
        }
        out.push(columns.iter().cloned().zip(row.iter().cloned()).collect());
    }
    Ok(out)
}

fn assignment_map(assignments: &[ast::Assignment]) -> Result<HashMap<String, Expr>, SqlError> {
    let mut map = HashMap::new();
    for a in assignments {
        let col = match &a.target {
            ast::AssignmentTarget::ColumnName(name) => object_name_last(name)
                .ok_or_else(|| SqlError::Parse("empty column name in SET".into()))?,
            _ => return Err(SqlError::Parse("unsupported SET target".into())),
        };
        map.insert(col, a.value.clone());
    }
    Ok(map)
}

/// Collect `col = value` conjuncts from a WHERE tree.
fn eq_filters(selection: &Option<Expr>) -> Result<HashMap<String, Expr>, SqlError> {
    let mut map = HashMap::new();
    if let Some(expr) = selection {
        collect_eq(expr, &mut map);
    }
    Ok(map)
}

fn collect_eq(expr: &Expr, map: &mut HashMap<String, Expr>) {
    if let Expr::BinaryOp { left, op, right } = expr {
        match op {
            ast::BinaryOperator::And => {
                collect_eq(left, map);
                collect_eq(right, map);
            }
            ast::BinaryOperator::Eq => {
                if let Some(col) = expr_column_name(left) {
                    map.insert(col, (**right).clone());
                }
            }
            _ => {}
        }
    }
}

/// Collect `date IN ('...', ...)` members from a WHERE tree.
fn date_list(selection: &Option<Expr>) -> Result<Vec<NaiveDate>, SqlError> {
    let mut out = Vec::new();
    if let Some(expr) = selection {
        collect_date_list(expr, &mut out)?;
    }
    Ok(out)
}

fn collect_date_list(expr: &Expr, out: &mut Vec<NaiveDate>) -> Result<(), SqlError> {
    match expr {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::And,
            right,
        } => {
            collect_date_list(left, out)?;
            collect_date_list(right, out)?;
        }
        Expr::InList { expr, list, negated: false } => {
            if expr_column_name(expr).as_deref() == Some("date") {
                for item in list {
                    out.push(parse_date_expr(item)?);
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_ulid_expr(expr: &Expr) -> Result<Ulid, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::SingleQuotedString(s) | Value::Number(s, _) => {
                Ulid::from_string(s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
            }
            _ => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::SingleQuotedString(s) => Ok(s.clone()),
            _ => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_date_expr(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = parse_string(expr)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .map_err(|e| SqlError::Parse(format!("bad date '{s}': {e}")))
}

fn parse_date_or_null(expr: &Expr) -> Result<Option<NaiveDate>, SqlError> {
    if let Some(Value::Null) = extract_value(expr) {
        return Ok(None);
    }
    Ok(Some(parse_date_expr(expr)?))
}

fn parse_decimal_expr(expr: &Expr) -> Result<Decimal, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => Decimal::from_str(s)
                .map_err(|e| SqlError::Parse(format!("bad decimal '{s}': {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_i64_expr(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad i64: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64_expr(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64_expr(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of u32 range")))
}

fn parse_bool(expr: &Expr) -> Result<bool, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Boolean(b) => Ok(*b),
            Value::SingleQuotedString(s) => match s.to_lowercase().as_str() {
                "true" | "t" | "1" => Ok(true),
                "false" | "f" | "0" => Ok(false),
                _ => Err(SqlError::Parse(format!("bad bool: {s}"))),
            },
            Value::Number(n, _) => Ok(n != "0"),
            _ => Err(SqlError::Parse(format!("expected bool, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

// Row/filter accessors

fn require_ulid(row: &HashMap<String, Expr>, col: &'static str) -> Result<Ulid, SqlError> {
    row.get(col)
        .ok_or(SqlError::MissingColumn(col))
        .and_then(parse_ulid_expr)
}

fn require_string(row: &HashMap<String, Expr>, col: &'static str) -> Result<String, SqlError> {
    row.get(col)
        .ok_or(SqlError::MissingColumn(col))
        .and_then(parse_string)
}

fn require_decimal(row: &HashMap<String, Expr>, col: &'static str) -> Result<Decimal, SqlError> {
    row.get(col)
        .ok_or(SqlError::MissingColumn(col))
        .and_then(parse_decimal_expr)
}

fn require_date(row: &HashMap<String, Expr>, col: &'static str) -> Result<NaiveDate, SqlError> {
    row.get(col)
        .ok_or(SqlError::MissingColumn(col))
        .and_then(parse_date_expr)
}

fn optional_string(row: &HashMap<String, Expr>, col: &str) -> Result<Option<String>, SqlError> {
    match row.get(col) {
        None => Ok(None),
        Some(e) => {
            if let Some(Value::Null) = extract_value(e) {
                return Ok(None);
            }
            parse_string(e).map(Some)
        }
    }
}

fn optional_date(row: &HashMap<String, Expr>, col: &str) -> Result<Option<NaiveDate>, SqlError> {
    match row.get(col) {
        None => Ok(None),
        Some(e) => parse_date_or_null(e),
    }
}

fn optional_u32(row: &HashMap<String, Expr>, col: &str) -> Result<Option<u32>, SqlError> {
    match row.get(col) {
        None => Ok(None),
        Some(e) => parse_u32(e).map(Some),
    }
}

fn filter_ulid(filters: &HashMap<String, Expr>, col: &'static str) -> Result<Ulid, SqlError> {
    filters
        .get(col)
        .ok_or(SqlError::MissingFilter(col))
        .and_then(parse_ulid_expr)
}

fn filter_string(filters: &HashMap<String, Expr>, col: &'static str) -> Result<String, SqlError> {
    filters
        .get(col)
        .ok_or(SqlError::MissingFilter(col))
        .and_then(parse_string)
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    WrongArity(&'static str, usize, usize),
    MissingColumn(&'static str),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingColumn(col) => write!(f, "missing column: {col}"),
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}
