//! HTTP session surface of the engine.
//!
//! The session is configured through control-channel commands; request and
//! response bodies flow over [`HTTP_CHANNEL`](crate::HTTP_CHANNEL) via the
//! bulk transfer primitives.

use airlink_frame::{CTRL_CHANNEL, MAX_PAYLOAD};
use airlink_port::LinkPort;
use airlink_proto::{reply, request::cert_set_prefix, HttpMethod, Request, HEADER_LEN};
use tracing::debug;

use crate::engine::{Engine, HTTP_CHANNEL};
use crate::error::{EngineError, Result};
use crate::scheduler::Scheduler;

impl<P: LinkPort, S: Scheduler> Engine<P, S> {
    /// Set the URL of the HTTP session.
    pub fn http_url_set(&mut self, url: &str) -> Result<()> {
        self.command(&Request::HttpUrlSet(url))?;
        Ok(())
    }

    /// Set the method of the HTTP session.
    pub fn http_method_set(&mut self, method: HttpMethod) -> Result<()> {
        self.command(&Request::HttpMethodSet(method))?;
        Ok(())
    }

    /// Add a request header, as a `Name: value` line.
    pub fn http_header_add(&mut self, header: &str) -> Result<()> {
        self.command(&Request::HttpHdrAdd(header))?;
        Ok(())
    }

    /// Delete a previously added request header by name.
    pub fn http_header_del(&mut self, name: &str) -> Result<()> {
        self.command(&Request::HttpHdrDel(name))?;
        Ok(())
    }

    /// Start the HTTP exchange, declaring the request body length.
    ///
    /// Enables the HTTP channel; body bytes then go out with
    /// [`send`](Self::send) on [`HTTP_CHANNEL`](crate::HTTP_CHANNEL).
    pub fn http_open(&mut self, content_len: u32) -> Result<()> {
        self.command(&Request::HttpOpen { content_len })?;
        self.framer
            .enable(HTTP_CHANNEL)
            .map_err(|_| EngineError::Param("channel out of range"))
    }

    /// Finish the HTTP exchange.
    ///
    /// Returns the response status and body length; the body follows on the
    /// HTTP channel via [`recv`](Self::recv).
    pub fn http_finish(&mut self) -> Result<(u16, u32)> {
        let len = self.command(&Request::HttpFinish)?;
        let (status, body_len) = reply::http_finish(self.payload(len))?;
        debug!(status, body_len, "http exchange finished");
        Ok((status, body_len))
    }

    /// Hash of the certificate installed for the HTTP session.
    pub fn http_cert_query(&mut self) -> Result<u32> {
        let len = self.command(&Request::HttpCertQuery)?;
        Ok(reply::cert_hash(self.payload(len))?)
    }

    /// Install a certificate for the HTTP session.
    ///
    /// Queries the installed hash first and skips the upload when the module
    /// already holds this one; returns whether an upload happened. A
    /// certificate too large for the command buffer goes out through the
    /// framer's split mode.
    pub fn http_cert_set(&mut self, hash: u32, cert: &[u8]) -> Result<bool> {
        self.check_ready()?;
        match self.http_cert_query() {
            Ok(existing) if existing == hash => {
                debug!(hash, "certificate already installed");
                return Ok(false);
            }
            Ok(_) | Err(EngineError::ErrorReply) => {}
            Err(err) => return Err(err),
        }

        let envelope = HEADER_LEN + 6 + cert.len();
        if envelope > MAX_PAYLOAD {
            return Err(EngineError::Param("certificate too large for one frame"));
        }

        let wait = self.cfg.frame_wait;
        if envelope <= self.cfg.buf_len {
            self.command(&Request::HttpCertSet { hash, cert })?;
        } else {
            let n = cert_set_prefix(hash, cert.len() as u16, &mut self.buf)?;
            self.framer
                .split_start(&self.buf[..n], envelope, CTRL_CHANNEL, wait)
                .map_err(EngineError::Send)?;
            self.framer
                .split_end(cert, wait)
                .map_err(EngineError::Send)?;
            self.wait_reply(wait)?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::EngineConfig;
    use crate::scheduler::StdScheduler;
    use crate::sim::ModuleSim;

    fn http_engine() -> Engine<ModuleSim, StdScheduler> {
        let mut sim = ModuleSim::new();
        sim.set_http_response(200, b"pong".to_vec());
        let mut engine = Engine::new(
            sim,
            StdScheduler,
            EngineConfig {
                poll_interval: Duration::ZERO,
                ..EngineConfig::default()
            },
        );
        engine.init().unwrap();
        engine
    }

    #[test]
    fn full_http_exchange() {
        let mut engine = http_engine();
        engine.http_url_set("https://example.com/api").unwrap();
        engine.http_method_set(HttpMethod::Post).unwrap();
        engine.http_header_add("Content-Type: text/plain").unwrap();
        engine.http_open(4).unwrap();
        engine.send(HTTP_CHANNEL, b"ping", 64).unwrap();

        let (status, body_len) = engine.http_finish().unwrap();
        assert_eq!(status, 200);
        assert_eq!(body_len, 4);

        let (ch, body) = engine.recv(64).unwrap();
        assert_eq!(ch, HTTP_CHANNEL);
        assert_eq!(body, b"pong");
        assert_eq!(engine.port_mut().http_request_body(), b"ping");
    }

    #[test]
    fn cert_upload_skipped_when_hash_matches() {
        let mut engine = http_engine();
        assert!(engine.http_cert_set(0xAB, b"cert").unwrap());
        assert_eq!(engine.http_cert_query().unwrap(), 0xAB);
        assert!(!engine.http_cert_set(0xAB, b"cert").unwrap());
    }

    #[test]
    fn oversized_cert_uses_split_frames() {
        let mut engine = http_engine();
        // Larger than the 512-byte command buffer, still one frame on the wire.
        let cert = vec![0x5A; 2000];
        assert!(engine.http_cert_set(0xC0FFEE, &cert).unwrap());
        assert_eq!(engine.http_cert_query().unwrap(), 0xC0FFEE);
        assert_eq!(engine.port_mut().cert_len(), 2000);
    }

    #[test]
    fn cert_beyond_frame_capacity_rejected() {
        let mut engine = http_engine();
        let cert = vec![0; MAX_PAYLOAD];
        assert!(matches!(
            engine.http_cert_set(1, &cert),
            Err(EngineError::Param(_))
        ));
    }
}
