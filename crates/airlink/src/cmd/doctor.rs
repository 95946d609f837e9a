use std::net::Ipv4Addr;
use std::time::Duration;

use airlink_engine::{Engine, EngineConfig, ModuleSim, StdScheduler, HTTP_CHANNEL};
use airlink_frame::Framer;
use airlink_port::{loopback_self_test, LoopbackPort};
use airlink_proto::ScanIter;

use crate::cmd::DoctorArgs;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};

struct CheckResult {
    name: &'static str,
    passed: bool,
    detail: String,
}

pub fn run(_args: DoctorArgs) -> CliResult<i32> {
    let mut checks = Vec::new();

    check(&mut checks, "port_selftest", || {
        let mut port = LoopbackPort::new();
        loopback_self_test(&mut port, 1000).map_err(|e| e.to_string())?;
        Ok("loopback pattern verified".into())
    });

    check(&mut checks, "framer_roundtrip", || {
        let mut framer = Framer::new(LoopbackPort::new());
        framer.enable(1).map_err(|e| e.to_string())?;
        framer.send(b"doctor", 1, 1000).map_err(|e| e.to_string())?;
        let mut buf = [0u8; 16];
        let (ch, len) = framer.receive(&mut buf, 1000).map_err(|e| e.to_string())?;
        if (ch, &buf[..len]) != (1, b"doctor".as_ref()) {
            return Err("payload mismatch".into());
        }
        Ok("frame round trip on channel 1".into())
    });

    let mut sim = ModuleSim::new();
    sim.set_assoc_delay(3);
    sim.set_http_response(200, b"doctor-response".to_vec());
    let mut engine = Engine::new(
        sim,
        StdScheduler,
        EngineConfig {
            poll_interval: Duration::ZERO,
            ..EngineConfig::default()
        },
    );

    check(&mut checks, "engine_init", || {
        engine.init().map_err(|e| e.to_string())?;
        Ok("self-test passed, control channel up".into())
    });

    check(&mut checks, "module_detect", || {
        let v = engine.detect().map_err(|e| e.to_string())?;
        Ok(format!("firmware {}.{}.{} ({})", v.major, v.minor, v.micro, v.variant))
    });

    check(&mut checks, "scan_walk", || {
        let blob = engine.ap_scan().map_err(|e| e.to_string())?.to_vec();
        let mut names = Vec::new();
        for entry in ScanIter::new(&blob) {
            let entry = entry.map_err(|e| e.to_string())?;
            names.push(String::from_utf8_lossy(entry.ssid).into_owned());
        }
        Ok(format!("{} network(s): {}", names.len(), names.join(", ")))
    });

    check(&mut checks, "association", || {
        engine.ap_join(0).map_err(|e| e.to_string())?;
        if !engine.assoc_wait(10).map_err(|e| e.to_string())? {
            return Err("association did not complete".into());
        }
        let ip = engine.ip_current().map_err(|e| e.to_string())?;
        Ok(format!("associated, leased {}", ip.addr))
    });

    check(&mut checks, "tcp_session", || {
        engine
            .tcp_connect(1, "example.com", 443, 0)
            .map_err(|e| e.to_string())?;
        if !engine.sock_conn_wait(1, 10).map_err(|e| e.to_string())? {
            return Err("connection did not establish".into());
        }
        engine.send(1, b"ping", 1000).map_err(|e| e.to_string())?;
        let (ch, data) = engine.recv(1000).map_err(|e| e.to_string())?;
        if (ch, data) != (1, b"ping".as_ref()) {
            return Err("echo mismatch".into());
        }
        engine.close(1).map_err(|e| e.to_string())?;
        Ok("connect, transfer and close on channel 1".into())
    });

    check(&mut checks, "udp_reuse", || {
        engine.udp_set(2, None, 8007).map_err(|e| e.to_string())?;
        let peer = Ipv4Addr::new(10, 0, 0, 7);
        engine
            .udp_send_to(2, peer, 4567, b"datagram", 1000)
            .map_err(|e| e.to_string())?;
        let (addr, port, payload) = engine.udp_recv_from(2, 1000).map_err(|e| e.to_string())?;
        if (addr, port, payload) != (peer, 4567, b"datagram".as_ref()) {
            return Err("datagram triple mismatch".into());
        }
        engine.close(2).map_err(|e| e.to_string())?;
        Ok("address prefix preserved through echo".into())
    });

    check(&mut checks, "flash_cycle", || {
        let (man, dev) = engine.flash_id().map_err(|e| e.to_string())?;
        engine.flash_write(0x1000, b"DOCT").map_err(|e| e.to_string())?;
        let read = engine.flash_read(0x1000, 4).map_err(|e| e.to_string())?;
        if read != b"DOCT" {
            return Err("readback mismatch".into());
        }
        engine.flash_erase(1).map_err(|e| e.to_string())?;
        Ok(format!("chip {man:02X}:{dev:04X}, write/read/erase ok"))
    });

    check(&mut checks, "http_exchange", || {
        engine
            .http_url_set("https://example.com/api")
            .map_err(|e| e.to_string())?;
        engine
            .http_method_set(airlink_proto::HttpMethod::Post)
            .map_err(|e| e.to_string())?;
        engine.http_open(4).map_err(|e| e.to_string())?;
        engine.send(HTTP_CHANNEL, b"ping", 1000).map_err(|e| e.to_string())?;
        let (status, body_len) = engine.http_finish().map_err(|e| e.to_string())?;
        let (ch, _) = engine.recv(1000).map_err(|e| e.to_string())?;
        if ch != HTTP_CHANNEL {
            return Err("body arrived on the wrong channel".into());
        }
        Ok(format!("status {status}, {body_len}-byte body"))
    });

    check(&mut checks, "cert_install", || {
        let uploaded = engine
            .http_cert_set(0xC0FFEE, b"certificate")
            .map_err(|e| e.to_string())?;
        let skipped = engine
            .http_cert_set(0xC0FFEE, b"certificate")
            .map_err(|e| e.to_string())?;
        if !uploaded || skipped {
            return Err("upload/skip sequence wrong".into());
        }
        Ok("uploaded once, skipped on matching hash".into())
    });

    let failed = checks.iter().any(|c| !c.passed);
    println!("airlink doctor\n");
    for c in &checks {
        let status = if c.passed { "PASS" } else { "FAIL" };
        println!("  [{status}] {:<16} {}", c.name, c.detail);
    }
    if failed {
        println!("\n  Result: one or more checks failed");
        Ok(HEALTH_CHECK_FAILED)
    } else {
        println!("\n  Result: all checks passed");
        Ok(SUCCESS)
    }
}

fn check<F>(checks: &mut Vec<CheckResult>, name: &'static str, f: F)
where
    F: FnOnce() -> Result<String, String>,
{
    let result = f();
    checks.push(match result {
        Ok(detail) => CheckResult {
            name,
            passed: true,
            detail,
        },
        Err(detail) => CheckResult {
            name,
            passed: false,
            detail,
        },
    });
}
