//! Name resolution (spec §3 "ResolvedEndpointList", spec §4.1 "Resolution
//! contract"). Grounded on
//! `original_source/include/jsocketpp/common.hpp`'s `resolveAddress`, which
//! wraps `getaddrinfo`/`freeaddrinfo` behind an owning, RAII-released list.

use crate::address::Address;
use crate::error::{ResolutionPhase, SocketError, SocketResult};
use crate::sys::{self, RawSocket};

/// One endpoint candidate produced by [`resolve`]: enough to hand straight
/// to [`sys::socket`].
#[derive(Debug, Clone)]
pub struct ResolvedEndpoint {
    pub family: i32,
    pub socket_type: i32,
    pub protocol: i32,
    pub address: Address,
}

/// An ordered, owned list of resolution candidates (spec §3). There is no
/// separate RAII wrapper at this layer -- the platform `resolve` call
/// already copies every candidate out of the OS-owned `addrinfo` chain and
/// frees the chain before returning (see `sys::unix::AddrinfoGuard`), so a
/// `Vec` here already satisfies "owns its storage, released deterministically
/// on drop".
pub type ResolvedEndpointList = Vec<ResolvedEndpoint>;

/// Resolves `host`/`port` into a [`ResolvedEndpointList`].
///
/// An empty `host` combined with `passive = true` yields wildcard addresses
/// suitable for `bind`. `numeric_only` sets `AI_NUMERICHOST`, guaranteeing
/// no DNS query is issued. Failures are always [`SocketError::ResolutionFailed`]
/// carrying the resolver-domain (`EAI_*`) code, never confused with an
/// errno/WSA [`SocketError::IoFailed`].
pub fn resolve(
    host: &str,
    port: u16,
    family: i32,
    socket_type: i32,
    protocol: i32,
    passive: bool,
    numeric_only: bool,
) -> SocketResult<ResolvedEndpointList> {
    let raw = sys::resolve(host, port, family, socket_type, protocol, passive, numeric_only)
        .map_err(|code| SocketError::resolution_failed(code, ResolutionPhase::Host))?;

    if raw.is_empty() {
        return Err(SocketError::resolution_failed(-1, ResolutionPhase::Host));
    }

    Ok(raw
        .into_iter()
        .map(|r| ResolvedEndpoint {
            family: r.family,
            socket_type: r.socket_type,
            protocol: r.protocol,
            address: r.address,
        })
        .collect())
}

/// Creates and returns a bound-but-not-listening socket from the first
/// candidate that successfully binds, preferring IPv6 candidates first so
/// dual-stack sockets come up when available (spec §4.3 "iterates in order
/// preferring IPv6 first").
pub fn bind_first(
    candidates: &ResolvedEndpointList,
    configure: impl Fn(RawSocket, &ResolvedEndpoint) -> SocketResult<()>,
) -> SocketResult<(RawSocket, Address)> {
    let mut ordered: Vec<&ResolvedEndpoint> = candidates.iter().collect();
    ordered.sort_by_key(|c| if c.family == AF_INET6 { 0 } else { 1 });

    let mut last_err = None;
    for candidate in ordered {
        let sock = match sys::socket(candidate.family, candidate.socket_type, candidate.protocol) {
            Ok(s) => s,
            Err(e) => {
                last_err = Some(e);
                continue;
            }
        };
        if let Err(e) = configure(sock, candidate).and_then(|_| sys::bind(sock, &candidate.address)) {
            let _ = sys::close(sock);
            last_err = Some(e);
            continue;
        }
        return Ok((sock, candidate.address.clone()));
    }
    Err(last_err.unwrap_or_else(|| SocketError::InvalidArgument("no resolved candidates".into())))
}

#[cfg(unix)]
const AF_INET6: i32 = libc::AF_INET6;
#[cfg(windows)]
const AF_INET6: i32 = winapi::AF_INET6 as i32;
