// SPDX-License-Identifier: Apache-2.0

use crate::access::{PermissionResource, Role};
use crate::status::{BookingStatus, InvoiceStatus, QuotationStatus, RequestStatus};

/// Storage and validation class of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ColumnKind {
    Text { max_len: usize },
    Email,
    Phone,
    Integer { min: i64, max: i64 },
    /// Integer cents.
    Money,
    /// Integer basis points.
    Percent,
    /// Positive decimal with up to six fraction digits, kept as text.
    Decimal,
    /// `YYYY-MM-DD`.
    Date,
    Bool,
    Enum(&'static [&'static str]),
    /// ISO 4217 code.
    Currency,
    /// Id of a live row of the same tenant in the named table.
    Reference(&'static str),
    Json,
}

impl ColumnKind {
    #[must_use]
    pub const fn is_integer_storage(self) -> bool {
        matches!(
            self,
            Self::Integer { .. } | Self::Money | Self::Percent | Self::Bool | Self::Reference(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub required: bool,
    pub filterable: bool,
    pub searchable: bool,
    pub sortable: bool,
    pub writable: bool,
    /// SQL literal used as the column default.
    pub default: Option<&'static str>,
}

impl ColumnSpec {
    const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            filterable: false,
            searchable: false,
            sortable: false,
            writable: true,
            default: None,
        }
    }

    pub const fn text(name: &'static str, max_len: usize) -> Self {
        Self::new(name, ColumnKind::Text { max_len })
    }
    pub const fn email(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Email)
    }
    pub const fn phone(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Phone)
    }
    pub const fn integer(name: &'static str, min: i64, max: i64) -> Self {
        Self::new(name, ColumnKind::Integer { min, max })
    }
    pub const fn money(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Money)
    }
    pub const fn percent(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Percent)
    }
    pub const fn decimal(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Decimal)
    }
    pub const fn date(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Date)
    }
    pub const fn boolean(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Bool)
    }
    pub const fn one_of(name: &'static str, values: &'static [&'static str]) -> Self {
        Self::new(name, ColumnKind::Enum(values))
    }
    pub const fn currency(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Currency)
    }
    pub const fn reference(name: &'static str, table: &'static str) -> Self {
        Self::new(name, ColumnKind::Reference(table))
    }
    pub const fn json(name: &'static str) -> Self {
        Self::new(name, ColumnKind::Json)
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }
    pub const fn filter(mut self) -> Self {
        self.filterable = true;
        self
    }
    pub const fn search(mut self) -> Self {
        self.searchable = true;
        self
    }
    pub const fn sort(mut self) -> Self {
        self.sortable = true;
        self
    }
    /// Computed by the store; rejected in request bodies.
    pub const fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }
    pub const fn default_to(mut self, literal: &'static str) -> Self {
        self.default = Some(literal);
        self
    }
}

/// Columns every tenant table carries in addition to its descriptor columns.
pub const SYSTEM_COLUMNS: &[&str] = &[
    "id",
    "organization_id",
    "created_by",
    "created_at",
    "updated_at",
    "deleted_at",
];

/// Static description of one CRUD collection mounted under `/api/<route>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub name: &'static str,
    pub route: &'static str,
    pub table: &'static str,
    pub permission: PermissionResource,
    /// Prefix of audit actions, e.g. `CLIENT` for `CLIENT_CREATED`.
    pub audit_resource: &'static str,
    pub columns: &'static [ColumnSpec],
    pub default_sort: &'static str,
    /// Parent column for seasonal pricing rows whose date ranges must not overlap.
    pub season_parent: Option<&'static str>,
    /// Further columns that split one parent's seasons into independent
    /// calendars, e.g. one per hotel room type.
    pub season_keys: &'static [&'static str],
    /// Document number assigned on create (`Q`, `B`, `INV`, `BILL`).
    pub number_prefix: Option<(&'static str, &'static str)>,
}

impl ResourceDescriptor {
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&'static ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names selected for responses, system columns first.
    #[must_use]
    pub fn select_columns(&self) -> Vec<&'static str> {
        let mut out: Vec<&'static str> = SYSTEM_COLUMNS
            .iter()
            .copied()
            .filter(|c| *c != "deleted_at")
            .collect();
        out.extend(self.columns.iter().map(|c| c.name));
        out
    }

    #[must_use]
    pub fn sortable_columns(&self) -> Vec<&'static str> {
        let mut out = vec!["id", "created_at", "updated_at"];
        out.extend(self.columns.iter().filter(|c| c.sortable).map(|c| c.name));
        out
    }

    pub fn filterable_columns(&self) -> impl Iterator<Item = &'static ColumnSpec> {
        self.columns.iter().filter(|c| c.filterable)
    }

    #[must_use]
    pub fn searchable_columns(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .filter(|c| c.searchable)
            .map(|c| c.name)
            .collect()
    }

    pub fn reference_columns(&self) -> impl Iterator<Item = (&'static str, &'static str)> {
        self.columns.iter().filter_map(|c| match c.kind {
            ColumnKind::Reference(table) => Some((c.name, table)),
            _ => None,
        })
    }
}

const ROLE_NAMES: &[&str] = Role::NAMES;
const REQUEST_STATUSES: &[&str] = RequestStatus::NAMES;
const QUOTATION_STATUSES: &[&str] = QuotationStatus::NAMES;
const BOOKING_STATUSES: &[&str] = BookingStatus::NAMES;
const INVOICE_STATUSES: &[&str] = InvoiceStatus::NAMES;

const CLIENT_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::text("name", 200).required().search().sort(),
    ColumnSpec::email("email").search().filter(),
    ColumnSpec::phone("phone").search(),
    ColumnSpec::text("nationality", 80).filter().sort(),
    ColumnSpec::one_of("client_type", &["individual", "corporate", "agency"]).filter(),
    ColumnSpec::text("source", 80).filter(),
    ColumnSpec::date("birth_date"),
    ColumnSpec::text("notes", 4000),
];

const AGENT_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::text("name", 200).required().search().sort(),
    ColumnSpec::email("email").search().filter(),
    ColumnSpec::phone("phone"),
    ColumnSpec::text("company", 200).search().filter(),
    ColumnSpec::percent("commission_pct").sort().default_to("0"),
    ColumnSpec::boolean("is_active").filter().default_to("1"),
];

const REQUEST_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::reference("client_id", "clients").required().filter(),
    ColumnSpec::reference("agent_id", "agents").filter(),
    ColumnSpec::text("destination", 200).required().search().filter().sort(),
    ColumnSpec::date("travel_start").filter().sort(),
    ColumnSpec::date("travel_end"),
    ColumnSpec::integer("adults", 1, 500).required(),
    ColumnSpec::integer("children", 0, 500).default_to("0"),
    ColumnSpec::money("budget_cents").sort(),
    ColumnSpec::currency("currency"),
    ColumnSpec::one_of("status", REQUEST_STATUSES).filter().sort().default_to("'new'"),
    ColumnSpec::text("notes", 4000).search(),
];

const QUOTATION_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::text("quote_number", 32).read_only().search().sort(),
    ColumnSpec::reference("client_id", "clients").required().filter(),
    ColumnSpec::reference("agent_id", "agents").filter(),
    ColumnSpec::reference("request_id", "requests").filter(),
    ColumnSpec::text("title", 200).required().search().sort(),
    ColumnSpec::text("destination", 200).search().filter(),
    ColumnSpec::date("start_date").required().filter().sort(),
    ColumnSpec::date("end_date").required(),
    ColumnSpec::integer("adults", 1, 500).required(),
    ColumnSpec::integer("children", 0, 500).default_to("0"),
    ColumnSpec::currency("currency").required().filter(),
    ColumnSpec::percent("markup_pct").default_to("0"),
    ColumnSpec::percent("tax_pct").default_to("0"),
    ColumnSpec::date("valid_until"),
    ColumnSpec::one_of("status", QUOTATION_STATUSES)
        .read_only()
        .filter()
        .sort()
        .default_to("'draft'"),
    ColumnSpec::money("subtotal_cents").read_only().default_to("0"),
    ColumnSpec::money("markup_cents").read_only().default_to("0"),
    ColumnSpec::money("tax_cents").read_only().default_to("0"),
    ColumnSpec::money("total_cents").read_only().sort().default_to("0"),
    ColumnSpec::text("notes", 4000),
];

const BOOKING_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::text("booking_number", 32).read_only().search().sort(),
    ColumnSpec::reference("quotation_id", "quotations").filter(),
    ColumnSpec::reference("client_id", "clients").required().filter(),
    ColumnSpec::reference("agent_id", "agents").filter(),
    ColumnSpec::text("destination", 200).search().filter(),
    ColumnSpec::date("start_date").required().filter().sort(),
    ColumnSpec::date("end_date").required(),
    ColumnSpec::integer("pax", 1, 1000).required(),
    ColumnSpec::money("total_cents").sort(),
    ColumnSpec::currency("currency").required(),
    ColumnSpec::one_of("status", BOOKING_STATUSES).filter().sort().default_to("'pending'"),
    ColumnSpec::text("notes", 4000),
];

const USER_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::email("email").required().search().sort(),
    ColumnSpec::text("name", 200).required().search().sort(),
    ColumnSpec::one_of("role", ROLE_NAMES).required().filter(),
    ColumnSpec::boolean("is_active").filter().default_to("1"),
];

const PROVIDER_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::text("name", 200).required().search().sort(),
    ColumnSpec::one_of(
        "provider_type",
        &["hotel", "guide", "transport", "restaurant", "activity", "other"],
    )
    .required()
    .filter(),
    ColumnSpec::text("contact_name", 200),
    ColumnSpec::email("email").search(),
    ColumnSpec::phone("phone"),
    ColumnSpec::text("city", 120).search().filter().sort(),
    ColumnSpec::text("country", 120).filter(),
    ColumnSpec::boolean("is_active").filter().default_to("1"),
    ColumnSpec::text("notes", 4000),
];

const HOTEL_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::reference("provider_id", "providers").filter(),
    ColumnSpec::text("name", 200).required().search().sort(),
    ColumnSpec::text("city", 120).required().search().filter().sort(),
    ColumnSpec::integer("stars", 1, 7).filter().sort(),
    ColumnSpec::text("address", 400),
    ColumnSpec::email("email"),
    ColumnSpec::phone("phone"),
    ColumnSpec::boolean("is_active").filter().default_to("1"),
];

const GUIDE_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::reference("provider_id", "providers").filter(),
    ColumnSpec::text("name", 200).required().search().sort(),
    ColumnSpec::text("languages", 200).search(),
    ColumnSpec::text("city", 120).search().filter().sort(),
    ColumnSpec::email("email"),
    ColumnSpec::phone("phone"),
    ColumnSpec::text("license_number", 64),
    ColumnSpec::boolean("is_active").filter().default_to("1"),
];

const VEHICLE_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::reference("provider_id", "providers").filter(),
    ColumnSpec::text("name", 200).required().search().sort(),
    ColumnSpec::text("vehicle_type", 64).required().filter(),
    ColumnSpec::integer("capacity", 1, 100).required().sort(),
    ColumnSpec::text("plate_number", 32).search(),
    ColumnSpec::text("city", 120).search().filter(),
    ColumnSpec::boolean("is_active").filter().default_to("1"),
];

const RESTAURANT_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::reference("provider_id", "providers").filter(),
    ColumnSpec::text("name", 200).required().search().sort(),
    ColumnSpec::text("city", 120).search().filter().sort(),
    ColumnSpec::text("cuisine", 80).filter(),
    ColumnSpec::money("price_per_person_cents").sort(),
    ColumnSpec::currency("currency"),
    ColumnSpec::phone("phone"),
    ColumnSpec::boolean("is_active").filter().default_to("1"),
];

const TRANSFER_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::reference("provider_id", "providers").filter(),
    ColumnSpec::text("name", 200).required().search().sort(),
    ColumnSpec::text("from_location", 200).required().search(),
    ColumnSpec::text("to_location", 200).required().search(),
    ColumnSpec::text("city", 120).search().filter(),
    ColumnSpec::text("vehicle_type", 64).filter(),
    ColumnSpec::money("price_cents").required().sort(),
    ColumnSpec::currency("currency").required(),
    ColumnSpec::boolean("is_active").filter().default_to("1"),
];

const ENTRANCE_FEE_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::text("name", 200).required().search().sort(),
    ColumnSpec::text("city", 120).search().filter().sort(),
    ColumnSpec::text("site_type", 80).filter(),
    ColumnSpec::boolean("is_active").filter().default_to("1"),
    ColumnSpec::text("notes", 4000),
];

const DAILY_TOUR_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::text("name", 200).required().search().sort(),
    ColumnSpec::text("city", 120).search().filter().sort(),
    ColumnSpec::integer("duration_hours", 1, 24),
    ColumnSpec::text("description", 4000).search(),
    ColumnSpec::boolean("is_active").filter().default_to("1"),
];

const EXTRA_EXPENSE_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::text("name", 200).required().search().sort(),
    ColumnSpec::text("category", 80).filter(),
    ColumnSpec::money("price_cents").required().sort(),
    ColumnSpec::currency("currency").required(),
    ColumnSpec::boolean("is_active").filter().default_to("1"),
];

const SEASON_FIELDS_START: ColumnSpec = ColumnSpec::date("start_date").required().filter().sort();
const SEASON_FIELDS_END: ColumnSpec = ColumnSpec::date("end_date").required().filter();
const SEASON_NAME: ColumnSpec = ColumnSpec::text("season_name", 120).required().search();

const HOTEL_PRICING_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::reference("hotel_id", "hotels").required().filter(),
    SEASON_NAME,
    SEASON_FIELDS_START,
    SEASON_FIELDS_END,
    ColumnSpec::text("room_type", 80).required().filter(),
    ColumnSpec::one_of("board_type", &["RO", "BB", "HB", "FB", "AI"]).filter(),
    ColumnSpec::money("price_per_night_cents").required().sort(),
    ColumnSpec::currency("currency").required(),
    ColumnSpec::text("notes", 4000),
];

const GUIDE_PRICING_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::reference("guide_id", "guides").required().filter(),
    SEASON_NAME,
    SEASON_FIELDS_START,
    SEASON_FIELDS_END,
    ColumnSpec::one_of("service_type", &["full_day", "half_day", "transfer", "night"]).filter(),
    ColumnSpec::money("price_cents").required().sort(),
    ColumnSpec::currency("currency").required(),
];

const VEHICLE_PRICING_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::reference("vehicle_id", "vehicles").required().filter(),
    SEASON_NAME,
    SEASON_FIELDS_START,
    SEASON_FIELDS_END,
    ColumnSpec::money("price_per_day_cents").required().sort(),
    ColumnSpec::money("price_per_transfer_cents"),
    ColumnSpec::currency("currency").required(),
];

const TOUR_PRICING_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::reference("daily_tour_id", "daily_tours").required().filter(),
    SEASON_NAME,
    SEASON_FIELDS_START,
    SEASON_FIELDS_END,
    ColumnSpec::money("adult_price_cents").required().sort(),
    ColumnSpec::money("child_price_cents"),
    ColumnSpec::currency("currency").required(),
];

const ENTRANCE_FEE_PRICING_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::reference("entrance_fee_id", "entrance_fees").required().filter(),
    SEASON_NAME,
    SEASON_FIELDS_START,
    SEASON_FIELDS_END,
    ColumnSpec::money("adult_price_cents").required().sort(),
    ColumnSpec::money("child_price_cents"),
    ColumnSpec::currency("currency").required(),
];

const RECEIVABLE_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::text("invoice_number", 32).read_only().search().sort(),
    ColumnSpec::reference("client_id", "clients").required().filter(),
    ColumnSpec::reference("booking_id", "bookings").filter(),
    ColumnSpec::date("issue_date").required().filter().sort(),
    ColumnSpec::date("due_date").required().filter().sort(),
    ColumnSpec::money("amount_cents").required().sort(),
    ColumnSpec::money("paid_cents").read_only().default_to("0"),
    ColumnSpec::currency("currency").required().filter(),
    ColumnSpec::one_of("status", INVOICE_STATUSES).read_only().filter().sort().default_to("'unpaid'"),
    ColumnSpec::text("notes", 4000),
];

const PAYABLE_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::text("invoice_number", 32).read_only().search().sort(),
    ColumnSpec::reference("provider_id", "providers").required().filter(),
    ColumnSpec::reference("booking_id", "bookings").filter(),
    ColumnSpec::text("supplier_reference", 120).search(),
    ColumnSpec::date("issue_date").required().filter().sort(),
    ColumnSpec::date("due_date").required().filter().sort(),
    ColumnSpec::money("amount_cents").required().sort(),
    ColumnSpec::money("paid_cents").read_only().default_to("0"),
    ColumnSpec::currency("currency").required().filter(),
    ColumnSpec::one_of("status", INVOICE_STATUSES).read_only().filter().sort().default_to("'unpaid'"),
    ColumnSpec::text("notes", 4000),
];

const EXCHANGE_RATE_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::currency("base_currency").required().filter(),
    ColumnSpec::currency("quote_currency").required().filter(),
    ColumnSpec::decimal("rate").required(),
    ColumnSpec::date("effective_date").required().filter().sort(),
    ColumnSpec::text("source", 120),
];

const fn plain(
    name: &'static str,
    route: &'static str,
    table: &'static str,
    permission: PermissionResource,
    audit_resource: &'static str,
    columns: &'static [ColumnSpec],
) -> ResourceDescriptor {
    ResourceDescriptor {
        name,
        route,
        table,
        permission,
        audit_resource,
        columns,
        default_sort: "-created_at",
        season_parent: None,
        season_keys: &[],
        number_prefix: None,
    }
}

const fn seasonal(
    name: &'static str,
    table: &'static str,
    audit_resource: &'static str,
    parent: &'static str,
    columns: &'static [ColumnSpec],
) -> ResourceDescriptor {
    ResourceDescriptor {
        name,
        route: name,
        table,
        permission: PermissionResource::Pricing,
        audit_resource,
        columns,
        default_sort: "start_date",
        season_parent: Some(parent),
        season_keys: &[],
        number_prefix: None,
    }
}

const fn numbered(
    mut desc: ResourceDescriptor,
    prefix: &'static str,
    column: &'static str,
) -> ResourceDescriptor {
    desc.number_prefix = Some((prefix, column));
    desc
}

/// Every generic collection. Route segments are relative to `/api/`.
pub static RESOURCES: &[ResourceDescriptor] = &[
    plain("clients", "clients", "clients", PermissionResource::Clients, "CLIENT", CLIENT_COLUMNS),
    plain("agents", "agents", "agents", PermissionResource::Agents, "AGENT", AGENT_COLUMNS),
    plain("requests", "requests", "requests", PermissionResource::Requests, "REQUEST", REQUEST_COLUMNS),
    numbered(
        plain("quotations", "quotations", "quotations", PermissionResource::Quotations, "QUOTATION", QUOTATION_COLUMNS),
        "Q",
        "quote_number",
    ),
    numbered(
        plain("bookings", "bookings", "bookings", PermissionResource::Bookings, "BOOKING", BOOKING_COLUMNS),
        "B",
        "booking_number",
    ),
    plain("users", "users", "users", PermissionResource::Users, "USER", USER_COLUMNS),
    plain("providers", "providers", "providers", PermissionResource::Providers, "PROVIDER", PROVIDER_COLUMNS),
    plain("hotels", "hotels", "hotels", PermissionResource::Providers, "HOTEL", HOTEL_COLUMNS),
    plain("guides", "guides", "guides", PermissionResource::Providers, "GUIDE", GUIDE_COLUMNS),
    plain("vehicles", "vehicles", "vehicles", PermissionResource::Providers, "VEHICLE", VEHICLE_COLUMNS),
    plain("restaurants", "restaurants", "restaurants", PermissionResource::Providers, "RESTAURANT", RESTAURANT_COLUMNS),
    plain("transfers", "transfers", "transfers", PermissionResource::Providers, "TRANSFER", TRANSFER_COLUMNS),
    plain("entrance-fees", "entrance-fees", "entrance_fees", PermissionResource::Providers, "ENTRANCE_FEE", ENTRANCE_FEE_COLUMNS),
    plain("daily-tours", "daily-tours", "daily_tours", PermissionResource::Providers, "DAILY_TOUR", DAILY_TOUR_COLUMNS),
    plain("extra-expenses", "extra-expenses", "extra_expenses", PermissionResource::Providers, "EXTRA_EXPENSE", EXTRA_EXPENSE_COLUMNS),
    ResourceDescriptor {
        season_keys: &["room_type"],
        ..seasonal("hotel-pricing", "hotel_pricing", "HOTEL_PRICING", "hotel_id", HOTEL_PRICING_COLUMNS)
    },
    seasonal("guide-pricing", "guide_pricing", "GUIDE_PRICING", "guide_id", GUIDE_PRICING_COLUMNS),
    seasonal("vehicle-pricing", "vehicle_pricing", "VEHICLE_PRICING", "vehicle_id", VEHICLE_PRICING_COLUMNS),
    seasonal("tour-pricing", "tour_pricing", "TOUR_PRICING", "daily_tour_id", TOUR_PRICING_COLUMNS),
    seasonal("entrance-fee-pricing", "entrance_fee_pricing", "ENTRANCE_FEE_PRICING", "entrance_fee_id", ENTRANCE_FEE_PRICING_COLUMNS),
    numbered(
        plain("invoices-receivable", "invoices/receivable", "invoices_receivable", PermissionResource::Invoices, "INVOICE_RECEIVABLE", RECEIVABLE_COLUMNS),
        "INV",
        "invoice_number",
    ),
    numbered(
        plain("invoices-payable", "invoices/payable", "invoices_payable", PermissionResource::Invoices, "INVOICE_PAYABLE", PAYABLE_COLUMNS),
        "BILL",
        "invoice_number",
    ),
    ResourceDescriptor {
        default_sort: "-effective_date",
        ..plain("exchange-rates", "finance/exchange-rates", "exchange_rates", PermissionResource::Finance, "EXCHANGE_RATE", EXCHANGE_RATE_COLUMNS)
    },
];

pub const EXPENSE_CATEGORIES: &[&str] = &[
    "hotel",
    "guide",
    "vehicle",
    "transfer",
    "restaurant",
    "entrance_fee",
    "daily_tour",
    "flight",
    "extra",
    "other",
];

const QUOTATION_DAY_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::reference("quotation_id", "quotations").read_only(),
    ColumnSpec::integer("day_number", 1, 365).required().sort(),
    ColumnSpec::date("date").sort(),
    ColumnSpec::text("title", 200).required(),
    ColumnSpec::text("city", 120),
    ColumnSpec::text("description", 4000),
];

const QUOTATION_EXPENSE_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::reference("quotation_id", "quotations").read_only(),
    ColumnSpec::reference("day_id", "quotation_days").filter(),
    ColumnSpec::one_of("category", EXPENSE_CATEGORIES).required().filter(),
    ColumnSpec::text("description", 400).required(),
    ColumnSpec::integer("quantity", 1, 10_000).required(),
    ColumnSpec::money("unit_price_cents").required(),
    ColumnSpec::money("total_cents").read_only().default_to("0"),
];

/// Days of a quotation itinerary, mounted under `/api/quotations/:id/days`.
pub static QUOTATION_DAYS: ResourceDescriptor = ResourceDescriptor {
    default_sort: "day_number",
    ..plain(
        "quotation-days",
        "quotations/days",
        "quotation_days",
        PermissionResource::Quotations,
        "QUOTATION_DAY",
        QUOTATION_DAY_COLUMNS,
    )
};

/// Priced services of a quotation, mounted under `/api/quotations/:id/expenses`.
pub static QUOTATION_EXPENSES: ResourceDescriptor = ResourceDescriptor {
    default_sort: "id",
    ..plain(
        "quotation-expenses",
        "quotations/expenses",
        "quotation_expenses",
        PermissionResource::Quotations,
        "QUOTATION_EXPENSE",
        QUOTATION_EXPENSE_COLUMNS,
    )
};

#[must_use]
pub fn resource_by_route(route: &str) -> Option<&'static ResourceDescriptor> {
    let route = route.trim_matches('/');
    RESOURCES.iter().find(|r| r.route == route)
}

#[must_use]
pub fn resource_by_name(name: &str) -> Option<&'static ResourceDescriptor> {
    RESOURCES.iter().find(|r| r.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn routes_tables_and_names_are_unique() {
        let routes: BTreeSet<_> = RESOURCES.iter().map(|r| r.route).collect();
        let tables: BTreeSet<_> = RESOURCES.iter().map(|r| r.table).collect();
        let names: BTreeSet<_> = RESOURCES.iter().map(|r| r.name).collect();
        assert_eq!(routes.len(), RESOURCES.len());
        assert_eq!(tables.len(), RESOURCES.len());
        assert_eq!(names.len(), RESOURCES.len());
    }

    #[test]
    fn references_point_at_known_tables() {
        let tables: BTreeSet<_> = RESOURCES.iter().map(|r| r.table).collect();
        for desc in RESOURCES {
            for (column, table) in desc.reference_columns() {
                assert!(tables.contains(table), "{}.{column} -> {table}", desc.table);
            }
        }
    }

    #[test]
    fn default_sort_columns_are_sortable() {
        for desc in RESOURCES {
            let field = desc.default_sort.trim_start_matches('-');
            assert!(desc.sortable_columns().contains(&field), "{}", desc.name);
        }
    }

    #[test]
    fn seasonal_resources_have_dates_and_parent() {
        for desc in RESOURCES.iter().filter(|d| d.season_parent.is_some()) {
            let parent = desc.season_parent.unwrap_or_default();
            assert!(desc.column(parent).is_some_and(|c| c.required));
            assert!(desc.column("start_date").is_some());
            assert!(desc.column("end_date").is_some());
            for key in desc.season_keys {
                assert!(desc.column(key).is_some_and(|c| c.required), "{}.{key}", desc.name);
            }
        }
    }

    #[test]
    fn nested_routes_resolve_with_or_without_slashes() {
        assert_eq!(
            resource_by_route("/invoices/receivable/").map(|r| r.table),
            Some("invoices_receivable")
        );
        assert_eq!(resource_by_route("finance/exchange-rates").map(|r| r.name), Some("exchange-rates"));
        assert!(resource_by_route("invoices").is_none());
    }
}
