use async_trait::async_trait;
use sea_orm::{
    Condition, DatabaseConnection, EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Select, Value,
    sea_query::{Alias, Expr, LikeExpr, SimpleExpr},
};

use super::{Container, RawPage, param};
use crate::errors::ApiError;
use crate::filtering::{FilterOperator, FilterType, SortDirection, ValueKind};

/// Container over a Sea-ORM query. Filters become `WHERE` conditions, sorts become
/// `ORDER BY` clauses, and the page is fetched with a count query followed by an
/// `OFFSET`/`LIMIT` query.
///
/// ```rust,ignore
/// let container = EntityContainer::new(
///     sms::Entity::find().filter(sms::Column::VoipId.eq(1)),
///     db.clone(),
/// );
/// ```
pub struct EntityContainer<E: EntityTrait> {
    query: Select<E>,
    db: DatabaseConnection,
    conditions: Vec<Condition>,
    orders: Vec<(String, Order)>,
}

impl<E: EntityTrait> EntityContainer<E> {
    pub fn new(query: Select<E>, db: DatabaseConnection) -> Self {
        Self {
            query,
            db,
            conditions: Vec::new(),
            orders: Vec::new(),
        }
    }

    /// The wrapped query with every applied filter and sort, without paging
    #[must_use]
    pub fn query(&self) -> Select<E> {
        let mut query = self.query.clone();

        if !self.conditions.is_empty() {
            let condition = self
                .conditions
                .iter()
                .cloned()
                .fold(Condition::all(), |all, condition| all.add(condition));
            query = query.filter(condition);
        }

        for (field, order) in &self.orders {
            let expr: SimpleExpr = column(field).into();
            query = query.order_by(expr, order.clone());
        }

        query
    }

    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Add an arbitrary condition, for custom filter functions
    pub fn add_condition(&mut self, condition: Condition) -> &mut Self {
        self.conditions.push(condition);
        self
    }
}

#[async_trait]
impl<E> Container for EntityContainer<E>
where
    E: EntityTrait,
    E::Model: Sync,
{
    type Item = E::Model;

    const BACKEND: &'static str = "relational";

    fn apply_filter(
        &mut self,
        filter: &FilterType<Self>,
        operator: FilterOperator,
        params: &[String],
    ) -> Result<&mut Self, ApiError> {
        let condition =
            build_condition(filter.field_name(), filter.value_kind(), operator, params)?;
        Ok(self.add_condition(condition))
    }

    fn set_sorting(&mut self, field: &str, direction: SortDirection) -> Result<&mut Self, ApiError> {
        self.orders.push((field.to_string(), direction.into()));
        Ok(self)
    }

    async fn get_items(&mut self, limit: u64, offset: u64) -> Result<RawPage<E::Model>, ApiError> {
        let query = self.query();

        // Count and page are separate round trips; a write in between can make them disagree
        let total = query.clone().count(&self.db).await?;
        let items = query.offset(offset).limit(limit).all(&self.db).await?;

        tracing::debug!(
            table = %E::default().table_name(),
            total,
            offset,
            limit,
            fetched = items.len(),
            "Fetched collection page"
        );

        Ok(RawPage { items, total })
    }
}

fn column(field: &str) -> Expr {
    Expr::col(Alias::new(field))
}

/// Translate one filter token into a condition on `field`
///
/// # Errors
///
/// Returns an internal error when a parameter is missing or does not parse as `kind`;
/// validation rejects such tokens before they get here.
pub fn build_condition(
    field: &str,
    kind: ValueKind,
    operator: FilterOperator,
    params: &[String],
) -> Result<Condition, ApiError> {
    use FilterOperator as Op;

    let value = |index: usize| -> Result<Value, ApiError> {
        coerce(kind, param(params, index, operator)?)
    };
    let pattern = |prefix: &str, suffix: &str| -> Result<LikeExpr, ApiError> {
        let literal = like_escape(param(params, 0, operator)?);
        Ok(LikeExpr::new(format!("{prefix}{literal}{suffix}")).escape('\\'))
    };

    let condition = match operator {
        Op::Empty => Condition::any()
            .add(column(field).is_null())
            .add(column(field).is_in(empty_values(kind))),
        Op::NotEmpty => Condition::all()
            .add(column(field).is_not_null())
            .add(column(field).is_not_in(empty_values(kind))),

        Op::Eq => Condition::all().add(column(field).eq(value(0)?)),
        Op::Ne => Condition::any()
            .add(column(field).ne(value(0)?))
            .add(column(field).is_null()),
        Op::Lt => Condition::all().add(column(field).lt(value(0)?)),
        Op::Gt => Condition::all().add(column(field).gt(value(0)?)),
        Op::Lte => Condition::all().add(column(field).lte(value(0)?)),
        Op::Gte => Condition::all().add(column(field).gte(value(0)?)),

        Op::StartsWith => Condition::all().add(column(field).like(pattern("", "%")?)),
        Op::EndsWith => Condition::all().add(column(field).like(pattern("%", "")?)),
        Op::Contains => Condition::all().add(column(field).like(pattern("%", "%")?)),
        Op::NotStartsWith => Condition::any()
            .add(column(field).not_like(pattern("", "%")?))
            .add(column(field).is_null()),
        Op::NotEndsWith => Condition::any()
            .add(column(field).not_like(pattern("%", "")?))
            .add(column(field).is_null()),
        Op::NotContains => Condition::any()
            .add(column(field).not_like(pattern("%", "%")?))
            .add(column(field).is_null()),

        Op::Between => Condition::all().add(column(field).between(value(0)?, value(1)?)),
        Op::NotBetween => Condition::any()
            .add(column(field).not_between(value(0)?, value(1)?))
            .add(column(field).is_null()),

        Op::In => Condition::all().add(column(field).is_in(values(kind, params, operator)?)),
        Op::NotIn => {
            Condition::all().add(column(field).is_not_in(values(kind, params, operator)?))
        }
    };

    Ok(condition)
}

fn values(kind: ValueKind, params: &[String], operator: FilterOperator) -> Result<Vec<Value>, ApiError> {
    if params.is_empty() {
        // Surfaces the arity error
        param(params, 0, operator)?;
    }
    params.iter().map(|raw| coerce(kind, raw)).collect()
}

fn coerce(kind: ValueKind, raw: &str) -> Result<Value, ApiError> {
    let invalid = || {
        ApiError::internal(
            "Filter could not be applied",
            Some(format!("'{raw}' is not a valid {kind:?} value")),
        )
    };

    Ok(match kind {
        ValueKind::Text => Value::from(raw.to_string()),
        ValueKind::Integer => Value::from(raw.trim().parse::<i64>().map_err(|_| invalid())?),
        ValueKind::Float => Value::from(raw.trim().parse::<f64>().map_err(|_| invalid())?),
        ValueKind::Boolean => match raw.trim() {
            "true" | "1" => Value::from(true),
            "false" | "0" => Value::from(false),
            _ => return Err(invalid()),
        },
    })
}

/// Values that count as empty besides NULL; text `"0"` is empty like the number zero
fn empty_values(kind: ValueKind) -> Vec<Value> {
    match kind {
        ValueKind::Text => vec![Value::from(String::new()), Value::from("0".to_string())],
        ValueKind::Integer => vec![Value::from(0_i64)],
        ValueKind::Float => vec![Value::from(0.0_f64)],
        ValueKind::Boolean => vec![Value::from(false)],
    }
}

/// Escape the LIKE wildcards in a literal user value
fn like_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
