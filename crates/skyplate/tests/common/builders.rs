//! JSON bodies shaped like the service's responses.

#![allow(dead_code)]

use serde_json::{json, Value};

use super::harness::ScriptedExchange;

pub const SESSION: &str = "sess-0123456789";

pub fn login_ok(session: &str) -> Value {
    json!({"status": "success", "message": "authenticated user: ", "session": session})
}

pub fn upload_ok(subid: u64) -> Value {
    json!({"status": "success", "subid": subid, "hash": "0f1e2d"})
}

pub fn server_error(message: &str) -> Value {
    json!({"status": "error", "errormessage": message})
}

pub fn submission_pending() -> Value {
    json!({
        "processing_started": "2024-01-15 10:29:58",
        "processing_finished": null,
        "jobs": [],
        "job_calibrations": [],
        "user": 1,
        "user_images": []
    })
}

pub fn submission_finished(jobs: &[Option<u64>]) -> Value {
    json!({
        "processing_started": "2024-01-15 10:29:58",
        "processing_finished": "2024-01-15 10:30:41",
        "jobs": jobs,
        "job_calibrations": [],
        "user": 1,
        "user_images": [77]
    })
}

pub fn job_status(status: &str) -> Value {
    json!({"status": status})
}

/// Orion's belt region at 36 arcsec per pixel.
pub fn calibration() -> Value {
    json!({
        "parity": 1.0,
        "orientation": 91.5,
        "pixscale": 36.0,
        "radius": 8.2,
        "ra": 83.82,
        "dec": -5.39
    })
}

pub fn tags(tags: &[&str]) -> Value {
    json!({"tags": tags})
}

pub fn objects_in_field(names: &[&str]) -> Value {
    json!({"objects_in_field": names})
}

pub fn star(names: &[&str], x: f64, y: f64) -> Value {
    json!({"type": "bright", "names": names, "pixelx": x, "pixely": y, "radius": 0.0})
}

pub fn annotations(records: Vec<Value>) -> Value {
    json!({"annotations": records})
}

/// Betelgeuse and Meissa four pixels apart, plus a nebula.
pub fn orion_annotations() -> Value {
    annotations(vec![
        star(&["Betelgeuse", "α Ori"], 100.0, 100.0),
        star(&["Meissa", "λ Ori"], 100.0, 104.0),
        json!({"type": "ngc", "names": ["NGC 1976", "M 42"], "pixelx": 300.0, "pixely": 420.0, "radius": 40.0}),
    ])
}

pub fn job_info() -> Value {
    json!({
        "status": "success",
        "original_filename": "orion.jpg",
        "objects_in_field": ["Betelgeuse", "Meissa"],
        "machine_tags": ["Betelgeuse"],
        "tags": ["Betelgeuse"],
        "calibration": calibration()
    })
}

/// Scripts a full successful run: login, upload, one finished submission
/// with job `job_id`, and every result endpoint.
pub fn script_solved(exchange: &ScriptedExchange, subid: u64, job_id: u64) {
    exchange
        .json("login", login_ok(SESSION))
        .json("upload", upload_ok(subid))
        .json(&format!("submissions/{}", subid), submission_finished(&[Some(job_id)]))
        .json(&format!("jobs/{}", job_id), job_status("success"));
    script_results(exchange, job_id);
}

/// Scripts the result endpoints and the WCS file of a solved job.
pub fn script_results(exchange: &ScriptedExchange, job_id: u64) {
    exchange
        .json(&format!("jobs/{}/calibration", job_id), calibration())
        .json(&format!("jobs/{}/tags", job_id), tags(&["Betelgeuse"]))
        .json(&format!("jobs/{}/machine_tags", job_id), tags(&["Betelgeuse"]))
        .json(
            &format!("jobs/{}/objects_in_field", job_id),
            objects_in_field(&["Betelgeuse", "Meissa"]),
        )
        .json(&format!("jobs/{}/annotations", job_id), orion_annotations())
        .json(&format!("jobs/{}/info", job_id), job_info())
        .file(&format!("wcs_file/{}", job_id), b"SIMPLE  =                    T");
}
