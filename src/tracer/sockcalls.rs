//! Socket-family syscall names, for debug logging of everything the
//! supervised program does on the network besides `connect`.

/// Name of a socket-family syscall, or None for anything else.
pub(crate) fn socket_syscall_name(sysno: u64) -> Option<&'static str> {
    let n = sysno as i64;
    match n {
        n if n == libc::SYS_socket => Some("socket"),
        n if n == libc::SYS_bind => Some("bind"),
        n if n == libc::SYS_connect => Some("connect"),
        n if n == libc::SYS_listen => Some("listen"),
        n if n == libc::SYS_accept => Some("accept"),
        n if n == libc::SYS_accept4 => Some("accept4"),
        n if n == libc::SYS_getsockname => Some("getsockname"),
        n if n == libc::SYS_getpeername => Some("getpeername"),
        n if n == libc::SYS_socketpair => Some("socketpair"),
        n if n == libc::SYS_sendto => Some("sendto"),
        n if n == libc::SYS_recvfrom => Some("recvfrom"),
        n if n == libc::SYS_shutdown => Some("shutdown"),
        n if n == libc::SYS_setsockopt => Some("setsockopt"),
        n if n == libc::SYS_getsockopt => Some("getsockopt"),
        n if n == libc::SYS_sendmsg => Some("sendmsg"),
        n if n == libc::SYS_recvmsg => Some("recvmsg"),
        n if n == libc::SYS_sendmmsg => Some("sendmmsg"),
        n if n == libc::SYS_recvmmsg => Some("recvmmsg"),
        _ => None,
    }
}
