/// Unit tests for the payload mapper
/// Covers field mapping, enum tables, conditional blocks, and pruning.
use intake_relay::fields::FieldReader;
use intake_relay::payload::{
    build_customer_payload, build_loan_application_payload, build_simple_customer_payload,
    loan_figures, prune,
};
use serde_json::{json, Map, Value};

fn reader_data(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

#[cfg(test)]
mod full_customer_tests {
    use super::*;

    #[test]
    fn nid_only_submission_maps_to_bare_customer() {
        let data = reader_data(json!({ "cedula": "001-1234567-8" }));
        let payload = build_customer_payload(&FieldReader::new(&data));

        // Only the NID survives inside customer; terms is always present.
        assert_eq!(payload["customer"], json!({ "NID": "00112345678" }));
        assert_eq!(payload["terms"], json!(false));
        assert!(payload.get("details").is_none());
    }

    #[test]
    fn full_submission_maps_every_section() {
        let data = reader_data(json!({
            "cedula": "001-1234567-8",
            "mf-listing-fname": "Ana",
            "apellido": "García",
            "fecha-nacimiento": "05-03-1990",
            "mf-email": "Ana.Garcia@Example.com",
            "estado-civil": "Casado(a)",
            "nacionalidad": "Dominicana",
            "tipo-vivienda": "Alquilada",
            "fecha-de-mudanza": "01-06-2015",
            "celular": "(809) 555-0123",
            "telefono-casa": "809-555-9876",
            "direccion": "Calle 5 #12",
            "mf-switch": "Sí",
            "ocupacion": "Contadora",
            "laborando-desde": "15-01-2018",
            "sueldo-mensual": "RD$ 45,000",
            "otros-ingresos": "0",
            "descripcion-otros-ingresos": "",
            "supervisor": "Marta Díaz",
            "nombre-empresa": "Acme SRL",
            "telefono-empresa": "809 555 2222",
            "direccion-empresa": "Av. Principal 100",
            "vehiculo-propio": "Sí",
            "vehiculo-financiado": "No",
            "vehiculo-marca": "Toyota",
            "vehiculo-anno": "2019",
            "conyugue": "Pedro García",
            "celular-conyugue": "809-555-3333",
            "nombre-referencia-1": "Rosa Mota",
            "ocupacion-referencia-1": "Abogada",
            "parentesco-referencia-1": "Hermana",
            "aceptacion-de-condiciones": "accepted"
        }));
        let payload = build_customer_payload(&FieldReader::new(&data));

        assert_eq!(payload["customer"]["NID"], json!("00112345678"));

        let details = &payload["customer"]["details"];
        assert_eq!(details["first_name"], json!("Ana"));
        assert_eq!(details["last_name"], json!("García"));
        assert_eq!(details["birthday"], json!("1990-03-05"));
        assert_eq!(details["email"], json!("ana.garcia@example.com"));
        assert_eq!(details["marital_status"], json!("married"));
        assert_eq!(details["housing_type"], json!("rented"));
        assert_eq!(details["move_in_date"], json!("2015-06-01"));
        assert_eq!(
            details["phones"],
            json!([
                { "number": "8095550123", "type": "mobile" },
                { "number": "8095559876", "type": "home" }
            ])
        );
        assert_eq!(
            details["addresses"],
            json!([{ "street": "Calle 5 #12", "type": "home" }])
        );

        let job_info = &payload["customer"]["jobInfo"];
        assert_eq!(job_info["is_self_employed"], json!(true));
        assert_eq!(job_info["role"], json!("Contadora"));
        assert_eq!(job_info["start_date"], json!("2018-01-15"));
        assert_eq!(job_info["salary"], json!(45000));
        // Zero income is data, not absence.
        assert_eq!(job_info["other_incomes"], json!(0));
        assert_eq!(job_info["supervisor_name"], json!("Marta Díaz"));

        let company = &payload["customer"]["company"];
        assert_eq!(company["name"], json!("Acme SRL"));
        assert_eq!(
            company["phones"],
            json!([{ "number": "8095552222", "type": "work" }])
        );
        assert_eq!(
            company["addresses"],
            json!([{ "street": "Av. Principal 100", "type": "work" }])
        );

        assert_eq!(
            payload["customer"]["vehicles"],
            json!([{
                "is_owned": true,
                "is_financed": false,
                "brand": "Toyota",
                "year": 2019
            }])
        );

        let references = payload["customer"]["references"].as_array().unwrap();
        assert_eq!(references.len(), 2);
        assert_eq!(
            references[0],
            json!({
                "name": "Pedro García",
                "phone_number": "8095553333",
                "relationship": "spouse"
            })
        );
        assert_eq!(
            references[1],
            json!({
                "name": "Rosa Mota",
                "occupation": "Abogada",
                "relationship": "Hermana"
            })
        );

        assert_eq!(payload["terms"], json!(true));
    }

    #[test]
    fn company_block_requires_a_name() {
        // A company phone without a company name must not resurrect the block.
        let data = reader_data(json!({
            "cedula": "00112345678",
            "telefono-empresa": "809-555-2222"
        }));
        let payload = build_customer_payload(&FieldReader::new(&data));

        assert!(payload["customer"].get("company").is_none());
    }

    #[test]
    fn vehicle_block_requires_any_vehicle_field() {
        let data = reader_data(json!({ "cedula": "00112345678" }));
        let payload = build_customer_payload(&FieldReader::new(&data));
        assert!(payload["customer"].get("vehicles").is_none());

        // A single vehicle answer is enough, even a negative one.
        let data = reader_data(json!({
            "cedula": "00112345678",
            "vehiculo-propio": "No"
        }));
        let payload = build_customer_payload(&FieldReader::new(&data));
        assert_eq!(
            payload["customer"]["vehicles"],
            json!([{ "is_owned": false }])
        );
    }

    #[test]
    fn unmapped_enum_values_fall_through_to_other() {
        let data = reader_data(json!({
            "cedula": "00112345678",
            "estado-civil": "Unión libre",
            "tipo-vivienda": "Familiar"
        }));
        let payload = build_customer_payload(&FieldReader::new(&data));

        assert_eq!(payload["customer"]["details"]["marital_status"], json!("other"));
        assert_eq!(payload["customer"]["details"]["housing_type"], json!("other"));
    }

    #[test]
    fn rejected_date_falls_out_of_the_payload() {
        let data = reader_data(json!({
            "cedula": "00112345678",
            "fecha-nacimiento": "31-02-1990"
        }));
        let payload = build_customer_payload(&FieldReader::new(&data));

        assert!(payload["customer"].get("details").is_none());
    }

    #[test]
    fn loan_details_map_when_present_with_monthly_default() {
        let data = reader_data(json!({
            "cedula": "00112345678",
            "monto-prestamo": "RD$ 50,000.50",
            "plazo-prestamo": "36"
        }));
        let payload = build_customer_payload(&FieldReader::new(&data));

        assert_eq!(
            payload["details"],
            json!({ "amount": 50000.50, "term": 36, "frequency": "monthly" })
        );
    }
}

#[cfg(test)]
mod simple_loan_tests {
    use super::*;

    #[test]
    fn minimal_customer_includes_guarantor_when_named() {
        let data = reader_data(json!({
            "cedula": "001-1234567-8",
            "nombre": "Luis",
            "apellido": "Pérez",
            "mf-email": "luis@example.com",
            "celular": "809-555-0001",
            "garante": "Juana Pérez",
            "celular-garante": "809-555-0002"
        }));
        let payload = build_simple_customer_payload(&FieldReader::new(&data));

        assert_eq!(payload["customer"]["NID"], json!("00112345678"));
        assert_eq!(payload["customer"]["details"]["first_name"], json!("Luis"));
        assert_eq!(
            payload["customer"]["references"],
            json!([{
                "name": "Juana Pérez",
                "phone_number": "8095550002",
                "relationship": "guarantor"
            }])
        );
    }

    #[test]
    fn minimal_customer_omits_absent_guarantor() {
        let data = reader_data(json!({
            "cedula": "001-1234567-8",
            "nombre": "Luis"
        }));
        let payload = build_simple_customer_payload(&FieldReader::new(&data));

        assert!(payload["customer"].get("references").is_none());
    }

    #[test]
    fn loan_figures_require_nonzero_amount_and_term() {
        let missing_amount = reader_data(json!({ "plazo-prestamo": "24" }));
        assert!(loan_figures(&FieldReader::new(&missing_amount)).is_err());

        let zero_amount = reader_data(json!({
            "monto-prestamo": "0",
            "plazo-prestamo": "24"
        }));
        assert!(loan_figures(&FieldReader::new(&zero_amount)).is_err());

        let missing_term = reader_data(json!({ "monto-prestamo": "25000" }));
        assert!(loan_figures(&FieldReader::new(&missing_term)).is_err());

        let valid = reader_data(json!({
            "monto-prestamo": "RD$ 25,000",
            "plazo-prestamo": "24"
        }));
        let figures = loan_figures(&FieldReader::new(&valid)).unwrap();
        assert_eq!(figures.amount, json!(25000));
        assert_eq!(figures.term, json!(24));
    }

    #[test]
    fn loan_application_references_the_resolved_customer() {
        let data = reader_data(json!({
            "monto-prestamo": "25000",
            "plazo-prestamo": "24",
            "proposito-prestamo": "Remodelación",
            "aceptacion-de-condiciones": "Si"
        }));
        let reader = FieldReader::new(&data);
        let figures = loan_figures(&reader).unwrap();
        let payload = build_loan_application_payload(55, &figures, &reader);

        assert_eq!(payload["customer_id"], json!(55));
        assert_eq!(payload["terms"], json!(true));
        assert_eq!(
            payload["details"],
            json!({
                "amount": 25000,
                "term": 24,
                "frequency": "monthly",
                "purpose": "Remodelación"
            })
        );
    }
}

#[cfg(test)]
mod pruning_tests {
    use super::*;

    #[test]
    fn nulls_and_empty_branches_disappear() {
        let value = json!({
            "a": null,
            "b": {},
            "c": [],
            "d": { "e": null, "f": [] },
            "g": "kept"
        });
        assert_eq!(prune(value), Some(json!({ "g": "kept" })));
    }

    #[test]
    fn falsy_scalars_survive() {
        let value = json!({
            "terms": false,
            "amount": 0,
            "rate": 0.0,
            "nested": { "flag": false }
        });
        assert_eq!(
            prune(value),
            Some(json!({
                "terms": false,
                "amount": 0,
                "rate": 0.0,
                "nested": { "flag": false }
            }))
        );
    }

    #[test]
    fn fully_empty_structures_prune_to_nothing() {
        assert_eq!(prune(json!({ "a": { "b": [] } })), None);
        assert_eq!(prune(json!([])), None);
        assert_eq!(prune(json!(null)), None);
    }
}
