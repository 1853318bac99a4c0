//! Destination decoding for intercepted `connect` syscalls.
//!
//! The syscall's second and third arguments are a pointer into the tracee's
//! address space and the length of the socket address stored there. The
//! decoder copies those bytes out and turns them into a
//! [`ConnectionAttempt`] without ever mutating tracee state.
//!
//! Two strategies exist behind one interface. `RawStruct` (the default)
//! decodes both the address and the port directly from the socket address
//! bytes. `RenderedText` is a compatibility shim that recovers the address
//! field from a formatter-style textual rendering of the same bytes; the
//! port is taken from the raw struct either way, because the rendered port
//! field overlaps adjacent struct padding and cannot be trusted.
//!
//! Anything that cannot be decoded - zero length, unreadable memory, an
//! unknown address family - yields an empty attempt, which the policy
//! engine treats as a leak. Decoding never allows by default.
//!
//! Per-tracee syscall stops are strictly ordered, so the bytes read here
//! always belong to the `connect` that is currently stopped; a tracee
//! cannot have two of its own connects in flight at once.

use std::net::{Ipv4Addr, Ipv6Addr};

use nix::sys::ptrace;
use nix::unistd::Pid;

use crate::policy::ConnectionAttempt;

/// Largest socket address the decoder will copy out of a tracee
/// (`sockaddr_storage` is 128 bytes on Linux).
pub const MAX_SOCKADDR_LEN: usize = 128;

/// Read-only access to a tracee's memory.
///
/// Abstracted so the decoder can be exercised against in-process buffers.
pub trait TraceeMemory {
    /// Copy `len` bytes starting at `addr`, or None if unreadable.
    fn read(&self, addr: u64, len: usize) -> Option<Vec<u8>>;
}

/// Tracee memory access via ptrace word reads.
///
/// Only valid while the tracee is stopped, which the dispatcher guarantees.
pub struct PtraceMemory {
    pid: Pid,
}

impl PtraceMemory {
    /// Access the memory of the given stopped tracee.
    pub fn new(pid: Pid) -> Self {
        Self { pid }
    }
}

impl TraceeMemory for PtraceMemory {
    fn read(&self, addr: u64, len: usize) -> Option<Vec<u8>> {
        let word_size = std::mem::size_of::<libc::c_long>();
        let mut bytes = Vec::with_capacity(len + word_size);

        while bytes.len() < len {
            let offset = bytes.len() as u64;
            let word = ptrace::read(
                self.pid,
                (addr.checked_add(offset)? as usize) as ptrace::AddressType,
            )
            .ok()?;
            bytes.extend_from_slice(&word.to_ne_bytes());
        }

        bytes.truncate(len);
        Some(bytes)
    }
}

/// How the address field of an attempt is recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeStrategy {
    /// Decode the address from the raw socket address bytes (default).
    #[default]
    RawStruct,
    /// Recover the address from a formatter-style textual rendering.
    RenderedText,
}

/// Decoder from raw `connect` arguments to a [`ConnectionAttempt`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressDecoder {
    strategy: DecodeStrategy,
}

impl AddressDecoder {
    /// Create a decoder using the given address strategy.
    pub fn new(strategy: DecodeStrategy) -> Self {
        Self { strategy }
    }

    /// Decode the destination of a `connect` whose socket address lives at
    /// `addr` (`addr_len` bytes) in the tracee's address space.
    ///
    /// Pure with respect to the tracee: reads memory, changes nothing.
    pub fn decode(&self, mem: &dyn TraceeMemory, addr: u64, addr_len: u64) -> ConnectionAttempt {
        let empty = ConnectionAttempt {
            ip: String::new(),
            port: String::new(),
        };

        let len = addr_len as usize;
        if len == 0 || len > MAX_SOCKADDR_LEN {
            return empty;
        }
        let Some(bytes) = mem.read(addr, len) else {
            return empty;
        };

        let parsed = parse_sockaddr(&bytes);
        let port = parsed
            .as_ref()
            .map(|(_, port)| port.clone())
            .unwrap_or_default();
        let ip = match self.strategy {
            DecodeStrategy::RawStruct => parsed.map(|(ip, _)| ip).unwrap_or_default(),
            DecodeStrategy::RenderedText => {
                address_from_rendered(&render_sockaddr(&bytes)).unwrap_or_default()
            }
        };

        ConnectionAttempt { ip, port }
    }
}

/// Interpret raw socket address bytes as `(address, port)`.
///
/// The port is converted from network to host byte order. Local socket
/// paths have an empty port; abstract names get a leading `@` in place of
/// the NUL marker.
fn parse_sockaddr(bytes: &[u8]) -> Option<(String, String)> {
    if bytes.len() < 2 {
        return None;
    }
    let family = u16::from_ne_bytes([bytes[0], bytes[1]]);

    if family == libc::AF_INET as u16 && bytes.len() >= 8 {
        let port = u16::from_be_bytes([bytes[2], bytes[3]]);
        let ip = Ipv4Addr::new(bytes[4], bytes[5], bytes[6], bytes[7]);
        return Some((ip.to_string(), port.to_string()));
    }

    if family == libc::AF_INET6 as u16 && bytes.len() >= 24 {
        let port = u16::from_be_bytes([bytes[2], bytes[3]]);
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&bytes[8..24]);
        let ip = Ipv6Addr::from(octets);
        return Some((ip.to_string(), port.to_string()));
    }

    if family == libc::AF_UNIX as u16 && bytes.len() > 2 {
        let raw = &bytes[2..];
        let path = if raw[0] == 0 {
            // Abstract socket: the name follows the NUL marker
            let name = &raw[1..];
            let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
            format!("@{}", String::from_utf8_lossy(&name[..end]))
        } else {
            let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            String::from_utf8_lossy(&raw[..end]).into_owned()
        };
        return Some((path, String::new()));
    }

    None
}

/// Render socket address bytes the way a generic syscall-argument formatter
/// would, e.g. `{Family: AF_INET, Addr: 0x7f000001, Port: 9050}`.
///
/// Input to the `RenderedText` compatibility strategy.
fn render_sockaddr(bytes: &[u8]) -> String {
    if bytes.len() < 2 {
        return String::new();
    }
    let family = u16::from_ne_bytes([bytes[0], bytes[1]]);

    if family == libc::AF_INET as u16 && bytes.len() >= 8 {
        let port = u16::from_be_bytes([bytes[2], bytes[3]]);
        return format!(
            "{{Family: AF_INET, Addr: 0x{:02x}{:02x}{:02x}{:02x}, Port: {}}}",
            bytes[4], bytes[5], bytes[6], bytes[7], port
        );
    }

    if let Some((addr, port)) = parse_sockaddr(bytes) {
        if port.is_empty() {
            return format!("{{Family: AF_UNIX, Addr: \"{}\"}}", addr);
        }
        return format!("{{Family: AF_INET6, Addr: \"{}\", Port: {}}}", addr, port);
    }

    String::new()
}

/// Extract the address field from a formatter-style rendering.
///
/// Locates `Addr:`, cuts at the nearer of `,` and `}`, strips quote and
/// space characters, and decodes `0x`-prefixed hexadecimal literals into
/// dotted-decimal IPv4.
fn address_from_rendered(data: &str) -> Option<String> {
    let start = data.find("Addr:")?;
    let rest = &data[start + 5..];

    let end = match (rest.find('}'), rest.find(',')) {
        (Some(close), Some(comma)) => close.min(comma),
        (Some(close), None) => close,
        (None, Some(comma)) => comma,
        (None, None) => return None,
    };

    let field: String = rest[..end]
        .chars()
        .filter(|&c| c != '"' && c != ' ')
        .collect();

    let addr = match field.strip_prefix("0x") {
        Some(hex) => decode_hex_ipv4(hex)?,
        None => field,
    };

    if addr.is_empty() {
        None
    } else {
        Some(addr)
    }
}

/// Decode eight hex digits as four bytes of dotted-decimal IPv4.
fn decode_hex_ipv4(hex: &str) -> Option<String> {
    if hex.len() != 8 || !hex.is_ascii() {
        return None;
    }
    let mut octets = [0u8; 4];
    for (i, octet) in octets.iter_mut().enumerate() {
        *octet = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(Ipv4Addr::from(octets).to_string())
}
