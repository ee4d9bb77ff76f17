//! Typed expression trees
//!
//! Every constructor checks operand types and returns `Result<Expr>`, so a
//! malformed expression is reported where it is written and never reaches
//! execution.

use super::column::ColumnRef;
use super::query::{Direction, OrderSpec, Selection};
use crate::error::{Error, Result};
use crate::functions;
use crate::planning::plan::QueryPlan;
use querykit_value::{DataType, Value};
use rust_decimal::Decimal;
use std::fmt::Display;
use std::sync::Arc;

/// An expression over the columns of a query's sources.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// A constant value.
    Literal(Value),
    /// A column of an aliased source.
    Column(ColumnRef),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `operand BETWEEN low AND high`, inclusive on both ends.
    Between {
        operand: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
    },
    /// `operand [NOT] IN (...)`.
    In {
        operand: Box<Expr>,
        set: InSet,
        negated: bool,
    },
    /// First matching branch wins.
    Case {
        branches: Vec<(Expr, Expr)>,
        otherwise: Option<Box<Expr>>,
        data_type: DataType,
    },
    /// An aggregate; `operand` is `None` for `count(*)`.
    Aggregate {
        func: AggregateFunc,
        operand: Option<Box<Expr>>,
    },
    /// A single-column subquery evaluated to one value.
    Subquery(Arc<QueryPlan>),
    /// A registered native function.
    Function {
        name: String,
        args: Vec<Expr>,
        data_type: DataType,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    IsNull,
    IsNotNull,
    Lower,
    Upper,
    /// Render any value as text.
    StringValue,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Concat,
    Like,
}

impl BinaryOp {
    fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Concat => "||",
            BinaryOp::Like => "LIKE",
        }
    }

    fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

impl AggregateFunc {
    fn name(&self) -> &'static str {
        match self {
            AggregateFunc::Count => "count",
            AggregateFunc::Sum => "sum",
            AggregateFunc::Avg => "avg",
            AggregateFunc::Max => "max",
            AggregateFunc::Min => "min",
        }
    }

    /// Result type of the aggregate over an operand of type `operand`.
    pub fn result_type(&self, operand: DataType) -> DataType {
        match self {
            AggregateFunc::Count => DataType::I64,
            AggregateFunc::Avg => DataType::F64,
            AggregateFunc::Sum if operand.is_integer() => DataType::I64,
            AggregateFunc::Sum | AggregateFunc::Max | AggregateFunc::Min => operand,
        }
    }
}

/// Right-hand side of an IN test.
#[derive(Clone, Debug, PartialEq)]
pub enum InSet {
    List(Vec<Expr>),
    Subquery(Arc<QueryPlan>),
}

/// Conversion into an expression operand. Implemented for expressions,
/// constructor results and plain values, which become literals.
pub trait IntoExpr {
    fn into_expr(self) -> Result<Expr>;
}

impl IntoExpr for Expr {
    fn into_expr(self) -> Result<Expr> {
        Ok(self)
    }
}

impl IntoExpr for &Expr {
    fn into_expr(self) -> Result<Expr> {
        Ok(self.clone())
    }
}

impl IntoExpr for Result<Expr> {
    fn into_expr(self) -> Result<Expr> {
        self
    }
}

impl IntoExpr for Value {
    fn into_expr(self) -> Result<Expr> {
        Ok(Expr::Literal(self))
    }
}

macro_rules! impl_literal_operand {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoExpr for $ty {
                fn into_expr(self) -> Result<Expr> {
                    Ok(Expr::Literal(Value::from(self)))
                }
            }
        )*
    };
}

impl_literal_operand!(bool, i32, i64, f64, Decimal, String, &str);

fn type_error(what: &str, found: impl Display) -> Error {
    Error::malformed(format!("{} expects {}", what, found))
}

impl Expr {
    /// A literal value.
    pub fn lit(value: impl Into<Value>) -> Expr {
        Expr::Literal(value.into())
    }

    /// The NULL literal.
    pub fn null() -> Expr {
        Expr::Literal(Value::Null)
    }

    /// `count(*)`
    pub fn count_all() -> Expr {
        Expr::Aggregate {
            func: AggregateFunc::Count,
            operand: None,
        }
    }

    /// A scalar subquery. The plan must project exactly one expression.
    pub fn subquery(plan: QueryPlan) -> Result<Expr> {
        plan.single_output_type().ok_or_else(|| {
            Error::malformed("scalar subquery must project exactly one expression")
        })?;
        Ok(Expr::Subquery(Arc::new(plan)))
    }

    /// A native function call, checked against the function registry.
    pub fn function(name: &str, args: Vec<Expr>) -> Result<Expr> {
        let arg_types: Vec<DataType> = args.iter().map(Expr::data_type).collect();
        let (name, data_type) = functions::validate_function(name, &arg_types)?;
        Ok(Expr::Function {
            name: name.to_string(),
            args,
            data_type,
        })
    }

    /// The static type of this expression.
    pub fn data_type(&self) -> DataType {
        match self {
            Expr::Literal(value) => value.data_type(),
            Expr::Column(column) => column.data_type,
            Expr::Unary { op, operand } => match op {
                UnaryOp::Not | UnaryOp::IsNull | UnaryOp::IsNotNull => DataType::Bool,
                UnaryOp::Negate => operand.data_type(),
                UnaryOp::Lower | UnaryOp::Upper | UnaryOp::StringValue => DataType::Str,
            },
            Expr::Binary { op, left, right } => match op {
                BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => left
                    .data_type()
                    .arithmetic_result(&right.data_type())
                    .unwrap_or(DataType::Null),
                BinaryOp::Concat => DataType::Str,
                _ => DataType::Bool,
            },
            Expr::Between { .. } | Expr::In { .. } => DataType::Bool,
            Expr::Case { data_type, .. } | Expr::Function { data_type, .. } => *data_type,
            Expr::Aggregate { func, operand } => func.result_type(
                operand
                    .as_ref()
                    .map(|o| o.data_type())
                    .unwrap_or(DataType::I64),
            ),
            Expr::Subquery(plan) => plan.single_output_type().unwrap_or(DataType::Null),
        }
    }

    fn unary(&self, op: UnaryOp) -> Expr {
        Expr::Unary {
            op,
            operand: Box::new(self.clone()),
        }
    }

    fn binary(&self, op: BinaryOp, rhs: impl IntoExpr) -> Result<Expr> {
        let right = rhs.into_expr()?;
        let (lt, rt) = (self.data_type(), right.data_type());
        let valid = match op {
            _ if op.is_comparison() => lt.comparable_with(&rt),
            BinaryOp::And | BinaryOp::Or => {
                matches!(lt, DataType::Bool | DataType::Null)
                    && matches!(rt, DataType::Bool | DataType::Null)
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                lt.arithmetic_result(&rt).is_some()
            }
            BinaryOp::Concat | BinaryOp::Like => {
                matches!(lt, DataType::Str | DataType::Null)
                    && matches!(rt, DataType::Str | DataType::Null)
            }
            _ => false,
        };
        if !valid {
            return Err(Error::malformed(format!(
                "cannot apply {} to {} and {}",
                op.symbol(),
                lt,
                rt
            )));
        }
        Ok(Expr::Binary {
            op,
            left: Box::new(self.clone()),
            right: Box::new(right),
        })
    }

    pub fn eq(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Eq, rhs)
    }

    pub fn ne(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Ne, rhs)
    }

    pub fn lt(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Lt, rhs)
    }

    pub fn le(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Le, rhs)
    }

    pub fn gt(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Gt, rhs)
    }

    pub fn ge(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Ge, rhs)
    }

    pub fn and(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::And, rhs)
    }

    pub fn or(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Or, rhs)
    }

    pub fn add(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Add, rhs)
    }

    pub fn sub(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Sub, rhs)
    }

    pub fn mul(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Mul, rhs)
    }

    /// Division; integer operands truncate toward zero.
    pub fn div(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Div, rhs)
    }

    pub fn concat(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Concat, rhs)
    }

    /// Pattern match with `%` and `_` wildcards.
    pub fn like(&self, pattern: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Like, pattern)
    }

    pub fn not(&self) -> Result<Expr> {
        match self.data_type() {
            DataType::Bool | DataType::Null => Ok(self.unary(UnaryOp::Not)),
            other => Err(type_error("NOT", format!("a boolean, found {}", other))),
        }
    }

    pub fn neg(&self) -> Result<Expr> {
        match self.data_type() {
            t if t.is_numeric() || t.is_null() => Ok(self.unary(UnaryOp::Negate)),
            other => Err(type_error("negation", format!("a number, found {}", other))),
        }
    }

    pub fn lower(&self) -> Result<Expr> {
        self.string_unary(UnaryOp::Lower, "lower")
    }

    pub fn upper(&self) -> Result<Expr> {
        self.string_unary(UnaryOp::Upper, "upper")
    }

    fn string_unary(&self, op: UnaryOp, name: &str) -> Result<Expr> {
        match self.data_type() {
            DataType::Str | DataType::Null => Ok(self.unary(op)),
            other => Err(type_error(name, format!("a string, found {}", other))),
        }
    }

    /// Render the value as text.
    pub fn string_value(&self) -> Expr {
        self.unary(UnaryOp::StringValue)
    }

    pub fn is_null(&self) -> Expr {
        self.unary(UnaryOp::IsNull)
    }

    pub fn is_not_null(&self) -> Expr {
        self.unary(UnaryOp::IsNotNull)
    }

    /// Inclusive range test.
    pub fn between(&self, low: impl IntoExpr, high: impl IntoExpr) -> Result<Expr> {
        let (low, high) = (low.into_expr()?, high.into_expr()?);
        let t = self.data_type();
        for bound in [&low, &high] {
            if !t.comparable_with(&bound.data_type()) {
                return Err(Error::malformed(format!(
                    "cannot compare {} with BETWEEN bound {}",
                    t,
                    bound.data_type()
                )));
            }
        }
        Ok(Expr::Between {
            operand: Box::new(self.clone()),
            low: Box::new(low),
            high: Box::new(high),
        })
    }

    fn in_list_inner<I, T>(&self, items: I, negated: bool) -> Result<Expr>
    where
        I: IntoIterator<Item = T>,
        T: IntoExpr,
    {
        let list = items
            .into_iter()
            .map(IntoExpr::into_expr)
            .collect::<Result<Vec<_>>>()?;
        let t = self.data_type();
        if let Some(bad) = list.iter().find(|e| !t.comparable_with(&e.data_type())) {
            return Err(Error::malformed(format!(
                "IN list element {} is not comparable with {}",
                bad.data_type(),
                t
            )));
        }
        Ok(Expr::In {
            operand: Box::new(self.clone()),
            set: InSet::List(list),
            negated,
        })
    }

    pub fn in_list<I, T>(&self, items: I) -> Result<Expr>
    where
        I: IntoIterator<Item = T>,
        T: IntoExpr,
    {
        self.in_list_inner(items, false)
    }

    pub fn not_in_list<I, T>(&self, items: I) -> Result<Expr>
    where
        I: IntoIterator<Item = T>,
        T: IntoExpr,
    {
        self.in_list_inner(items, true)
    }

    fn in_subquery_inner(&self, plan: QueryPlan, negated: bool) -> Result<Expr> {
        let sub_type = plan
            .single_output_type()
            .ok_or_else(|| Error::malformed("IN subquery must project exactly one expression"))?;
        if !self.data_type().comparable_with(&sub_type) {
            return Err(Error::malformed(format!(
                "IN subquery of {} is not comparable with {}",
                sub_type,
                self.data_type()
            )));
        }
        Ok(Expr::In {
            operand: Box::new(self.clone()),
            set: InSet::Subquery(Arc::new(plan)),
            negated,
        })
    }

    pub fn in_subquery(&self, plan: QueryPlan) -> Result<Expr> {
        self.in_subquery_inner(plan, false)
    }

    pub fn not_in_subquery(&self, plan: QueryPlan) -> Result<Expr> {
        self.in_subquery_inner(plan, true)
    }

    fn aggregate(&self, func: AggregateFunc) -> Result<Expr> {
        if self.contains_aggregate() {
            return Err(Error::malformed(format!(
                "{}({}) nests an aggregate",
                func.name(),
                self
            )));
        }
        let t = self.data_type();
        let valid = match func {
            AggregateFunc::Count => true,
            AggregateFunc::Sum | AggregateFunc::Avg => t.is_numeric() || t.is_null(),
            AggregateFunc::Max | AggregateFunc::Min => {
                t.is_numeric() || matches!(t, DataType::Str | DataType::Null)
            }
        };
        if !valid {
            return Err(type_error(
                func.name(),
                format!("a numeric operand, found {}", t),
            ));
        }
        Ok(Expr::Aggregate {
            func,
            operand: Some(Box::new(self.clone())),
        })
    }

    /// `count(expr)`: non-NULL values.
    pub fn count(&self) -> Result<Expr> {
        self.aggregate(AggregateFunc::Count)
    }

    pub fn sum(&self) -> Result<Expr> {
        self.aggregate(AggregateFunc::Sum)
    }

    pub fn avg(&self) -> Result<Expr> {
        self.aggregate(AggregateFunc::Avg)
    }

    pub fn max(&self) -> Result<Expr> {
        self.aggregate(AggregateFunc::Max)
    }

    pub fn min(&self) -> Result<Expr> {
        self.aggregate(AggregateFunc::Min)
    }

    /// Operand-form CASE: `when(v)` tests `self == v`.
    pub fn case(&self) -> Case {
        Case {
            operand: Some(self.clone()),
            branches: Vec::new(),
            error: None,
        }
    }

    pub fn asc(&self) -> OrderSpec {
        OrderSpec::new(self.clone(), Direction::Asc)
    }

    pub fn desc(&self) -> OrderSpec {
        OrderSpec::new(self.clone(), Direction::Desc)
    }

    /// Label this expression in a projection.
    pub fn alias(&self, name: impl Into<String>) -> Selection {
        Selection::Expr {
            expr: self.clone(),
            alias: Some(name.into()),
        }
    }

    /// Direct children, not descending into subqueries.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Literal(_) | Expr::Column(_) | Expr::Subquery(_) => vec![],
            Expr::Unary { operand, .. } => vec![operand.as_ref()],
            Expr::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expr::Between { operand, low, high } => {
                vec![operand.as_ref(), low.as_ref(), high.as_ref()]
            }
            Expr::In { operand, set, .. } => {
                let mut children = vec![operand.as_ref()];
                if let InSet::List(list) = set {
                    children.extend(list.iter());
                }
                children
            }
            Expr::Case {
                branches,
                otherwise,
                ..
            } => {
                let mut children: Vec<&Expr> =
                    branches.iter().flat_map(|(c, v)| [c, v]).collect();
                children.extend(otherwise.as_deref());
                children
            }
            Expr::Aggregate { operand, .. } => operand.as_deref().into_iter().collect(),
            Expr::Function { args, .. } => args.iter().collect(),
        }
    }

    /// Pre-order walk. Returning `false` from `visit` skips the node's
    /// children.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Expr) -> bool) {
        if visit(self) {
            for child in self.children() {
                child.walk(visit);
            }
        }
    }

    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if matches!(e, Expr::Aggregate { .. }) {
                found = true;
            }
            !found
        });
        found
    }

    /// Column references, excluding those inside subqueries.
    pub fn columns(&self) -> Vec<&ColumnRef> {
        let mut columns = Vec::new();
        self.walk(&mut |e| {
            if let Expr::Column(c) = e {
                columns.push(c);
            }
            true
        });
        columns
    }

    /// Subquery plans referenced directly by this expression.
    pub fn subqueries(&self) -> Vec<&Arc<QueryPlan>> {
        let mut plans = Vec::new();
        self.walk(&mut |e| {
            match e {
                Expr::Subquery(plan)
                | Expr::In {
                    set: InSet::Subquery(plan),
                    ..
                } => plans.push(plan),
                _ => {}
            }
            true
        });
        plans
    }

    /// Names of native functions used, including inside subqueries.
    pub fn functions(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.walk(&mut |e| {
            if let Expr::Function { name, .. } = e {
                names.push(name.clone());
            }
            true
        });
        for plan in self.subqueries() {
            names.extend(plan.functions());
        }
        names
    }
}

impl From<ColumnRef> for Expr {
    fn from(column: ColumnRef) -> Self {
        Expr::Column(column)
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Literal(Value::Str(s)) => write!(f, "'{}'", s),
            Expr::Literal(value) => write!(f, "{}", value),
            Expr::Column(column) => write!(f, "{}", column),
            Expr::Unary { op, operand } => match op {
                UnaryOp::Not => write!(f, "(NOT {})", operand),
                UnaryOp::Negate => write!(f, "(-{})", operand),
                UnaryOp::IsNull => write!(f, "({} IS NULL)", operand),
                UnaryOp::IsNotNull => write!(f, "({} IS NOT NULL)", operand),
                UnaryOp::Lower => write!(f, "lower({})", operand),
                UnaryOp::Upper => write!(f, "upper({})", operand),
                UnaryOp::StringValue => write!(f, "str({})", operand),
            },
            Expr::Binary { op, left, right } => write!(f, "({} {} {})", left, op.symbol(), right),
            Expr::Between { operand, low, high } => {
                write!(f, "({} BETWEEN {} AND {})", operand, low, high)
            }
            Expr::In {
                operand,
                set,
                negated,
            } => {
                let not = if *negated { " NOT" } else { "" };
                match set {
                    InSet::List(list) => {
                        write!(f, "({}{} IN (", operand, not)?;
                        for (i, item) in list.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{}", item)?;
                        }
                        write!(f, "))")
                    }
                    InSet::Subquery(_) => write!(f, "({}{} IN (subquery))", operand, not),
                }
            }
            Expr::Case {
                branches,
                otherwise,
                ..
            } => {
                write!(f, "CASE")?;
                for (condition, value) in branches {
                    write!(f, " WHEN {} THEN {}", condition, value)?;
                }
                if let Some(otherwise) = otherwise {
                    write!(f, " ELSE {}", otherwise)?;
                }
                write!(f, " END")
            }
            Expr::Aggregate { func, operand } => match operand {
                Some(operand) => write!(f, "{}({})", func.name(), operand),
                None => write!(f, "{}(*)", func.name()),
            },
            Expr::Subquery(_) => write!(f, "(subquery)"),
            Expr::Function { name, args, .. } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// CASE expression builder.
///
/// ```ignore
/// Case::new().when(age.between(0, 20)).then("0~20").otherwise("etc")
/// age.case().when(10).then("ten").otherwise("other")
/// ```
#[derive(Debug)]
pub struct Case {
    operand: Option<Expr>,
    branches: Vec<(Expr, Expr)>,
    error: Option<Error>,
}

impl Default for Case {
    fn default() -> Self {
        Self::new()
    }
}

impl Case {
    /// Searched CASE; each `when` takes a boolean condition.
    pub fn new() -> Self {
        Case {
            operand: None,
            branches: Vec::new(),
            error: None,
        }
    }

    pub fn when(self, condition: impl IntoExpr) -> When {
        let condition = match &self.operand {
            Some(operand) => operand.eq(condition),
            None => condition.into_expr(),
        };
        When {
            case: self,
            condition,
        }
    }

    pub fn otherwise(self, value: impl IntoExpr) -> Result<Expr> {
        self.finish(Some(value.into_expr()))
    }

    /// Close the CASE without a fallback value.
    pub fn end(self) -> Result<Expr> {
        self.finish(None)
    }

    fn finish(self, otherwise: Option<Result<Expr>>) -> Result<Expr> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let otherwise = otherwise.transpose()?;
        if self.branches.is_empty() {
            return Err(Error::malformed("CASE needs at least one WHEN branch"));
        }

        let mut data_type = DataType::Null;
        for value in self
            .branches
            .iter()
            .map(|(_, v)| v)
            .chain(otherwise.as_ref())
        {
            data_type = data_type.unify(&value.data_type()).ok_or_else(|| {
                Error::malformed(format!(
                    "CASE branches disagree: {} and {}",
                    data_type,
                    value.data_type()
                ))
            })?;
        }

        Ok(Expr::Case {
            branches: self.branches,
            otherwise: otherwise.map(Box::new),
            data_type,
        })
    }
}

/// A CASE branch awaiting its `then` value.
#[derive(Debug)]
pub struct When {
    case: Case,
    condition: Result<Expr>,
}

impl When {
    pub fn then(self, value: impl IntoExpr) -> Case {
        let mut case = self.case;
        if case.error.is_some() {
            return case;
        }
        let branch = self.condition.and_then(|condition| {
            match condition.data_type() {
                DataType::Bool | DataType::Null => {}
                other => {
                    return Err(type_error(
                        "WHEN",
                        format!("a boolean condition, found {}", other),
                    ));
                }
            }
            Ok((condition, value.into_expr()?))
        });
        match branch {
            Ok(branch) => case.branches.push(branch),
            Err(err) => case.error = Some(err),
        }
        case
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::column::Source;
    use crate::types::schema::{Field, RecordType};

    fn member() -> Source {
        let record_type = RecordType::new(
            "Member",
            vec![
                Field::new("id", DataType::I64).primary_key(),
                Field::new("username", DataType::Str),
                Field::new("age", DataType::I32).nullable(false),
            ],
        )
        .unwrap();
        Source::new(&Arc::new(record_type), "member")
    }

    #[test]
    fn test_types_are_computed_at_construction() {
        let member = member();
        let age = member.col("age").unwrap();
        assert_eq!(age.add(1).unwrap().data_type(), DataType::I32);
        assert_eq!(age.add(1i64).unwrap().data_type(), DataType::I64);
        assert_eq!(age.mul(1.5).unwrap().data_type(), DataType::F64);
        assert_eq!(age.sum().unwrap().data_type(), DataType::I64);
        assert_eq!(age.avg().unwrap().data_type(), DataType::F64);
        assert_eq!(age.max().unwrap().data_type(), DataType::I32);
        assert_eq!(Expr::count_all().data_type(), DataType::I64);
        assert_eq!(age.string_value().data_type(), DataType::Str);
    }

    #[test]
    fn test_incompatible_operands_are_rejected() {
        let member = member();
        let age = member.col("age").unwrap();
        let username = member.col("username").unwrap();

        assert_eq!(
            age.eq("ten").unwrap_err().kind(),
            ErrorKind::MalformedExpression
        );
        assert!(username.add(1).is_err());
        assert!(age.concat("x").is_err());
        assert!(age.lower().is_err());
        assert!(username.sum().is_err());
        assert!(age.sum().unwrap().sum().is_err());
        assert!(age.in_list(["a", "b"]).is_err());
        assert!(member.col("missing").is_err());
    }

    #[test]
    fn test_case_branches_must_agree() {
        let member = member();
        let age = member.col("age").unwrap();

        let ok = age.case().when(10).then("ten").when(20).then("twenty").otherwise("other");
        assert_eq!(ok.unwrap().data_type(), DataType::Str);

        let mismatched = age.case().when(10).then("ten").otherwise(0);
        assert!(mismatched.is_err());

        let not_boolean = Case::new().when(age.clone()).then("x").end();
        assert!(not_boolean.is_err());

        assert!(Case::new().otherwise(1).is_err());
    }

    #[test]
    fn test_display() {
        let member = member();
        let age = member.col("age").unwrap();
        let expr = age.add(1).unwrap().gt(20).unwrap();
        assert_eq!(expr.to_string(), "((member.age + 1) > 20)");
        assert_eq!(Expr::count_all().to_string(), "count(*)");
    }
}
