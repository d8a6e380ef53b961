use crate::errors::RelayError;
use crate::fields::{self, FieldReader, FieldStep};
use crate::transform;
use serde_json::{json, Map, Value};

/// Maps raw form submissions onto the remote API's payload shapes.
///
/// Field keys are the ones the deployed forms actually use (mostly Spanish);
/// mappings are fixed per deployment, not user-configurable. Every builder
/// finishes with [`prune`], so empty branches never reach the wire while
/// booleans and numeric zero always survive.

const DIGITS: &[FieldStep] = &[FieldStep::Transform(transform::digits_value)];
const BOOL: &[FieldStep] = &[FieldStep::Transform(transform::bool_value)];
const DATE: &[FieldStep] = &[FieldStep::Transform(transform::date_value)];
const NUMERIC: &[FieldStep] = &[FieldStep::Transform(transform::numeric_value)];
const EMAIL: &[FieldStep] = &[FieldStep::Sanitize(fields::sanitize_email)];

/// Required numeric figures for a loan application.
#[derive(Debug, Clone)]
pub struct LoanFigures {
    pub amount: Value,
    pub term: Value,
}

/// Builds the full-customer payload.
///
/// Branches with no data (company without a name, references without any of
/// their own fields, an untouched vehicle section) are omitted entirely.
/// `terms` is always present as a boolean, defaulting to false.
pub fn build_customer_payload(reader: &FieldReader) -> Value {
    let mut customer = Map::new();
    insert(&mut customer, "NID", reader.get_with("cedula", DIGITS));

    // -- personal details --
    let mut details = Map::new();
    insert(&mut details, "first_name", reader.get("mf-listing-fname"));
    insert(&mut details, "last_name", reader.get("apellido"));
    insert(
        &mut details,
        "birthday",
        reader.get_with("fecha-nacimiento", DATE),
    );
    insert(&mut details, "email", reader.get_with("mf-email", EMAIL));
    if let Some(raw) = reader.get("estado-civil").and_then(as_string) {
        details.insert(
            "marital_status".to_string(),
            json!(map_marital_status(&raw)),
        );
    }
    insert(&mut details, "nationality", reader.get("nacionalidad"));
    if let Some(raw) = reader.get("tipo-vivienda").and_then(as_string) {
        details.insert("housing_type".to_string(), json!(map_housing_type(&raw)));
    }
    insert(
        &mut details,
        "move_in_date",
        reader.get_with("fecha-de-mudanza", DATE),
    );

    let mut phones = Vec::new();
    if let Some(mobile) = reader.get_with("celular", DIGITS) {
        phones.push(json!({ "number": mobile, "type": "mobile" }));
    }
    if let Some(home) = reader.get_with("telefono-casa", DIGITS) {
        phones.push(json!({ "number": home, "type": "home" }));
    }
    details.insert("phones".to_string(), Value::Array(phones));

    let mut addresses = Vec::new();
    if let Some(street) = reader.get("direccion") {
        addresses.push(json!({ "street": street, "type": "home" }));
    }
    details.insert("addresses".to_string(), Value::Array(addresses));

    customer.insert("details".to_string(), Value::Object(details));

    // -- employment --
    let mut job_info = Map::new();
    insert(
        &mut job_info,
        "is_self_employed",
        reader.get_with("mf-switch", BOOL),
    );
    insert(&mut job_info, "role", reader.get("ocupacion"));
    insert(
        &mut job_info,
        "start_date",
        reader.get_with("laborando-desde", DATE),
    );
    insert(
        &mut job_info,
        "salary",
        reader.get_with("sueldo-mensual", NUMERIC),
    );
    insert(
        &mut job_info,
        "other_incomes",
        reader.get_with("otros-ingresos", NUMERIC),
    );
    insert(
        &mut job_info,
        "other_incomes_source",
        reader.get("descripcion-otros-ingresos"),
    );
    insert(&mut job_info, "supervisor_name", reader.get("supervisor"));
    customer.insert("jobInfo".to_string(), Value::Object(job_info));

    // -- company: the whole object stands or falls with its name --
    if let Some(name) = reader.get("nombre-empresa") {
        let mut company = Map::new();
        company.insert("name".to_string(), name);

        let mut company_phones = Vec::new();
        if let Some(number) = reader.get_with("telefono-empresa", DIGITS) {
            company_phones.push(json!({ "number": number, "type": "work" }));
        }
        company.insert("phones".to_string(), Value::Array(company_phones));

        let mut company_addresses = Vec::new();
        if let Some(street) = reader.get("direccion-empresa") {
            company_addresses.push(json!({ "street": street, "type": "work" }));
        }
        company.insert("addresses".to_string(), Value::Array(company_addresses));

        customer.insert("company".to_string(), Value::Object(company));
    }

    // -- vehicle: one entry, only when the section was touched at all --
    let is_owned = reader.get_with("vehiculo-propio", BOOL);
    let is_financed = reader.get_with("vehiculo-financiado", BOOL);
    let brand = reader.get("vehiculo-marca");
    let year = reader.get_with("vehiculo-anno", NUMERIC);
    let mut vehicles = Vec::new();
    if is_owned.is_some() || is_financed.is_some() || brand.is_some() || year.is_some() {
        let mut vehicle = Map::new();
        insert(&mut vehicle, "is_owned", is_owned);
        insert(&mut vehicle, "is_financed", is_financed);
        insert(&mut vehicle, "brand", brand);
        insert(&mut vehicle, "year", year);
        vehicles.push(Value::Object(vehicle));
    }
    customer.insert("vehicles".to_string(), Value::Array(vehicles));

    customer.insert(
        "references".to_string(),
        Value::Array(build_references(reader)),
    );

    let mut root = Map::new();
    root.insert("customer".to_string(), Value::Object(customer));
    root.insert("terms".to_string(), Value::Bool(terms_accepted(reader)));

    let loan_details = build_loan_details(reader);
    if !loan_details.is_empty() {
        root.insert("details".to_string(), Value::Object(loan_details));
    }

    prune(Value::Object(root)).unwrap_or_else(|| json!({}))
}

/// Builds the minimal customer payload used by the simple-loan pipeline.
pub fn build_simple_customer_payload(reader: &FieldReader) -> Value {
    let mut customer = Map::new();
    insert(&mut customer, "NID", reader.get_with("cedula", DIGITS));

    let mut details = Map::new();
    insert(&mut details, "first_name", reader.get("nombre"));
    insert(&mut details, "last_name", reader.get("apellido"));
    insert(&mut details, "email", reader.get_with("mf-email", EMAIL));

    let mut phones = Vec::new();
    if let Some(mobile) = reader.get_with("celular", DIGITS) {
        phones.push(json!({ "number": mobile, "type": "mobile" }));
    }
    details.insert("phones".to_string(), Value::Array(phones));
    customer.insert("details".to_string(), Value::Object(details));

    // Optional single guarantor reference.
    let mut references = Vec::new();
    let guarantor_name = reader.get("garante");
    let guarantor_phone = reader.get_with("celular-garante", DIGITS);
    if guarantor_name.is_some() || guarantor_phone.is_some() {
        let mut entry = Map::new();
        insert(&mut entry, "name", guarantor_name);
        insert(&mut entry, "phone_number", guarantor_phone);
        entry.insert("relationship".to_string(), json!("guarantor"));
        references.push(Value::Object(entry));
    }
    customer.insert("references".to_string(), Value::Array(references));

    let mut root = Map::new();
    root.insert("customer".to_string(), Value::Object(customer));
    prune(Value::Object(root)).unwrap_or_else(|| json!({}))
}

/// Extracts the required loan figures, rejecting missing or zero values.
///
/// Zero or absent amount/term reflects bad input, not a transient fault, so
/// the resulting error is terminal and nothing is sent for the task.
pub fn loan_figures(reader: &FieldReader) -> Result<LoanFigures, RelayError> {
    let amount = reader
        .get_with("monto-prestamo", NUMERIC)
        .filter(is_nonzero)
        .ok_or_else(|| {
            RelayError::Validation("loan amount (monto-prestamo) is missing or zero".to_string())
        })?;
    let term = reader
        .get_with("plazo-prestamo", NUMERIC)
        .filter(is_nonzero)
        .ok_or_else(|| {
            RelayError::Validation("loan term (plazo-prestamo) is missing or zero".to_string())
        })?;
    Ok(LoanFigures { amount, term })
}

/// Builds the loan-application payload for an existing customer.
pub fn build_loan_application_payload(
    customer_id: i64,
    figures: &LoanFigures,
    reader: &FieldReader,
) -> Value {
    let mut details = Map::new();
    details.insert("amount".to_string(), figures.amount.clone());
    details.insert("term".to_string(), figures.term.clone());
    insert(&mut details, "rate", reader.get_with("tasa-interes", NUMERIC));
    details.insert(
        "frequency".to_string(),
        reader.get("frecuencia-pago").unwrap_or_else(|| json!("monthly")),
    );
    insert(&mut details, "purpose", reader.get("proposito-prestamo"));

    let mut root = Map::new();
    root.insert("customer_id".to_string(), json!(customer_id));
    root.insert("terms".to_string(), Value::Bool(terms_accepted(reader)));
    root.insert("details".to_string(), Value::Object(details));
    prune(Value::Object(root)).unwrap_or_else(|| json!({}))
}

/// Recursively removes empty branches from a payload.
///
/// Null scalars disappear, maps and lists that end up empty disappear with
/// them. Booleans and numbers are always kept, including false and zero.
pub fn prune(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Bool(_) | Value::Number(_) | Value::String(_) => Some(value),
        Value::Array(items) => {
            let pruned: Vec<Value> = items.into_iter().filter_map(prune).collect();
            if pruned.is_empty() {
                None
            } else {
                Some(Value::Array(pruned))
            }
        }
        Value::Object(entries) => {
            let mut pruned = Map::new();
            for (key, entry) in entries {
                if let Some(entry) = prune(entry) {
                    pruned.insert(key, entry);
                }
            }
            if pruned.is_empty() {
                None
            } else {
                Some(Value::Object(pruned))
            }
        }
    }
}

fn build_references(reader: &FieldReader) -> Vec<Value> {
    let mut references = Vec::new();

    // Spouse entry: included when either the name or the phone is present.
    let spouse_name = reader.get("conyugue");
    let spouse_phone = reader.get_with("celular-conyugue", DIGITS);
    if spouse_name.is_some() || spouse_phone.is_some() {
        let mut entry = Map::new();
        insert(&mut entry, "name", spouse_name);
        insert(&mut entry, "phone_number", spouse_phone);
        entry.insert("relationship".to_string(), json!("spouse"));
        references.push(Value::Object(entry));
    }

    // Named references: each keyed by its own name field.
    for idx in 1..=2 {
        if let Some(name) = reader.get(&format!("nombre-referencia-{}", idx)) {
            let mut entry = Map::new();
            entry.insert("name".to_string(), name);
            insert(
                &mut entry,
                "occupation",
                reader.get(&format!("ocupacion-referencia-{}", idx)),
            );
            insert(
                &mut entry,
                "relationship",
                reader.get(&format!("parentesco-referencia-{}", idx)),
            );
            references.push(Value::Object(entry));
        }
    }

    references
}

fn build_loan_details(reader: &FieldReader) -> Map<String, Value> {
    let mut details = Map::new();
    insert(
        &mut details,
        "amount",
        reader.get_with("monto-prestamo", NUMERIC),
    );
    insert(
        &mut details,
        "term",
        reader.get_with("plazo-prestamo", NUMERIC),
    );
    insert(&mut details, "rate", reader.get_with("tasa-interes", NUMERIC));
    insert(&mut details, "frequency", reader.get("frecuencia-pago"));
    insert(&mut details, "purpose", reader.get("proposito-prestamo"));
    if !details.is_empty() && !details.contains_key("frequency") {
        details.insert("frequency".to_string(), json!("monthly"));
    }
    details
}

fn terms_accepted(reader: &FieldReader) -> bool {
    reader
        .get_with("aceptacion-de-condiciones", BOOL)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn map_marital_status(raw: &str) -> &'static str {
    match raw.to_lowercase().as_str() {
        "soltero(a)" => "single",
        "casado(a)" => "married",
        "divorciado(a)" => "divorced",
        "viudo(a)" => "widowed",
        _ => "other",
    }
}

fn map_housing_type(raw: &str) -> &'static str {
    match raw.to_lowercase().as_str() {
        "propia" => "owned",
        "alquilada" => "rented",
        "hipotecada" => "mortgaged",
        _ => "other",
    }
}

fn insert(map: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        map.insert(key.to_string(), value);
    }
}

fn as_string(value: Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn is_nonzero(value: &Value) -> bool {
    value.as_f64().map(|f| f != 0.0).unwrap_or(false)
}
