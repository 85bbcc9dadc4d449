//! Service types and assembled service instances.

use std::{
    collections::HashSet,
    fmt,
    net::IpAddr,
};

use crate::packet::{
    decoder::ResourceRecord,
    name::{DomainName, Label},
    records::Record,
};

/// The set of service types that have already been queried during a run.
///
/// Insertion is idempotent and there is no eviction; the set lives exactly as long as its
/// [`Browser`](crate::browser::Browser).
#[derive(Debug, Default)]
pub struct ServiceTypes {
    seen: HashSet<DomainName>,
}

impl ServiceTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether `name` has been marked as seen.
    pub fn seen(&self, name: &DomainName) -> bool {
        self.seen.contains(name)
    }

    /// Marks `name` as seen, returning `true` if it was not seen before.
    pub fn mark_seen(&mut self, name: DomainName) -> bool {
        self.seen.insert(name)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DomainName> {
        self.seen.iter()
    }
}

/// One service instance, as described by the records of a single response.
///
/// Every field is best-effort: a response that lacks a record kind leaves the corresponding
/// field empty.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ServiceInstance {
    instance_name: String,
    service_label: String,
    protocol_label: String,
    host_port: String,
    addresses: Vec<IpAddr>,
}

impl ServiceInstance {
    /// Folds `records` (answers followed by additional records, in receive order) into a
    /// [`ServiceInstance`].
    ///
    /// - PTR: the instance name is the pointer target minus the record's owner name. If the owner
    ///   name is exactly `<service>.<protocol>.local.`, the service and protocol labels are taken
    ///   from it, with leading underscores removed. Other owner shapes leave them alone.
    /// - SRV: `host:port` of the target.
    /// - A / AAAA: appended to the address list.
    /// - Anything else (including TXT) is ignored.
    ///
    /// When a kind occurs more than once, the last PTR or SRV record wins.
    pub fn assemble<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a ResourceRecord>,
    {
        let mut this = Self::default();
        for rr in records {
            match rr.data() {
                Record::PTR(ptr) => {
                    this.instance_name = match ptr.ptrdname().strip_suffix(rr.name()) {
                        Some(instance) => join_labels(instance),
                        None => format!("{}.", join_labels(ptr.ptrdname().labels())),
                    };
                    if let [service, proto, local] = rr.name().labels() {
                        if local.as_bytes() == b"local" {
                            this.service_label = strip_underscores(service);
                            this.protocol_label = strip_underscores(proto);
                        }
                    }
                }
                Record::SRV(srv) => {
                    let target = srv.target().to_string();
                    let host = target.strip_suffix('.').unwrap_or(&target);
                    this.host_port = format!("{}:{}", host, srv.port());
                }
                Record::A(a) => this.addresses.push(a.addr().into()),
                Record::AAAA(aaaa) => this.addresses.push(aaaa.addr().into()),
                Record::TXT(_) | Record::Other(_) => {}
            }
        }
        this
    }

    /// The instance's own name, e.g. `My Printer`.
    #[inline]
    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// The service label without underscore, e.g. `ipp`.
    #[inline]
    pub fn service_label(&self) -> &str {
        &self.service_label
    }

    /// The transport protocol label without underscore, `tcp` or `udp`.
    #[inline]
    pub fn protocol_label(&self) -> &str {
        &self.protocol_label
    }

    /// `<host>:<port>` from the SRV record, or an empty string.
    #[inline]
    pub fn host_port(&self) -> &str {
        &self.host_port
    }

    /// Addresses from A and AAAA records, in receive order, duplicates included.
    #[inline]
    pub fn addresses(&self) -> &[IpAddr] {
        &self.addresses
    }

    /// Returns a [`Display`](fmt::Display) adapter that renders this instance as an output line
    /// (without line terminator).
    ///
    /// The line is `protocol \t service \t host:port \t instance`, optionally followed by a tab
    /// and the comma-separated addresses.
    pub fn line(&self, with_addresses: bool) -> Line<'_> {
        Line {
            instance: self,
            with_addresses,
        }
    }
}

impl fmt::Display for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.line(false), f)
    }
}

/// Output line for a [`ServiceInstance`], see [`ServiceInstance::line`].
pub struct Line<'a> {
    instance: &'a ServiceInstance,
    with_addresses: bool,
}

impl fmt::Display for Line<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let i = self.instance;
        write!(
            f,
            "{}\t{}\t{}\t{}",
            i.protocol_label, i.service_label, i.host_port, i.instance_name,
        )?;
        if self.with_addresses {
            f.write_str("\t")?;
            for (n, addr) in i.addresses.iter().enumerate() {
                if n != 0 {
                    f.write_str(",")?;
                }
                write!(f, "{addr}")?;
            }
        }
        Ok(())
    }
}

fn join_labels(labels: &[Label]) -> String {
    labels
        .iter()
        .map(|label| label.to_string_lossy())
        .collect::<Vec<_>>()
        .join(".")
}

fn strip_underscores(label: &Label) -> String {
    label.to_string_lossy().trim_start_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use expect_test::expect;

    use super::*;
    use crate::packet::{
        decoder::Message,
        encoder::{self, MessageEncoder},
        records::{Unknown, A, AAAA, PTR, SRV, TXT},
        Header, Type,
    };

    fn name(s: &str) -> DomainName {
        s.parse().unwrap()
    }

    /// Encodes `records` as the answer section of a response and decodes it again.
    fn records(records: &[(&str, Record)]) -> Vec<ResourceRecord> {
        let owners: Vec<_> = records.iter().map(|(owner, _)| name(owner)).collect();
        let mut buf = [0; 1500];
        let mut header = Header::default();
        header.set_response(true);
        let mut enc = MessageEncoder::new(&mut buf).answers();
        enc.set_header(header);
        for (owner, (_, data)) in owners.iter().zip(records) {
            enc.add_answer(encoder::ResourceRecord::new(owner, data));
        }
        let len = enc.finish().unwrap();
        Message::decode(&buf[..len]).unwrap().answers().to_vec()
    }

    fn ptr(target: &str) -> Record {
        PTR::new(name(target)).into()
    }

    fn srv(target: &str, port: u16) -> Record {
        SRV::new(0, 0, port, name(target)).into()
    }

    fn a(addr: [u8; 4]) -> Record {
        A::new(Ipv4Addr::from(addr)).into()
    }

    #[test]
    fn service_types_are_a_set() {
        let mut types = ServiceTypes::new();
        assert!(types.is_empty());
        assert!(!types.seen(&name("_http._tcp.local")));
        assert!(types.mark_seen(name("_http._tcp.local")));
        assert!(!types.mark_seen(name("_http._tcp.local.")));
        assert!(types.seen(&name("_http._tcp.local")));
        assert!(types.mark_seen(name("_ipp._tcp.local")));
        assert_eq!(types.len(), 2);
        assert_eq!(types.iter().count(), 2);
    }

    #[test]
    fn printer() {
        let rrs = records(&[
            ("_http._tcp.local", ptr("My Printer._http._tcp.local")),
            ("My Printer._http._tcp.local", srv("printer.local", 631)),
            ("printer.local", a([192, 168, 1, 5])),
        ]);
        let instance = ServiceInstance::assemble(&rrs);
        assert_eq!(instance.instance_name(), "My Printer");
        assert_eq!(instance.service_label(), "http");
        assert_eq!(instance.protocol_label(), "tcp");
        assert_eq!(instance.host_port(), "printer.local:631");
        assert_eq!(instance.addresses(), [IpAddr::from([192, 168, 1, 5])]);
        expect![[r#"tcp	http	printer.local:631	My Printer"#]].assert_eq(&instance.to_string());
    }

    #[test]
    fn any_record_order() {
        let rrs = records(&[
            ("host.local", AAAA::new(Ipv6Addr::LOCALHOST).into()),
            ("x._ssh._tcp.local", TXT::new([&b""[..]]).into()),
            ("x._ssh._tcp.local", srv("host.local.", 22)),
            ("host.local", a([10, 0, 0, 7])),
            ("host.local", a([10, 0, 0, 7])),
            ("_ssh._tcp.local", ptr("x._ssh._tcp.local")),
        ]);
        let instance = ServiceInstance::assemble(&rrs);
        expect![[r#"tcp	ssh	host.local:22	x	::1,10.0.0.7,10.0.0.7"#]]
            .assert_eq(&instance.line(true).to_string());
    }

    #[test]
    fn empty_response() {
        let instance = ServiceInstance::assemble(&[] as &[ResourceRecord]);
        assert_eq!(instance, ServiceInstance::default());
        assert_eq!(instance.to_string(), "\t\t\t");
        assert_eq!(instance.line(true).to_string(), "\t\t\t\t");
    }

    #[test]
    fn only_three_label_local_owners_set_labels() {
        // subtype browsing name, 5 labels
        let rrs = records(&[(
            "_printer._sub._http._tcp.local",
            ptr("Office._http._tcp.local"),
        )]);
        let instance = ServiceInstance::assemble(&rrs);
        assert_eq!(instance.service_label(), "");
        assert_eq!(instance.protocol_label(), "");
        assert_eq!(instance.instance_name(), "Office._http._tcp.local.");

        // wide-area domain instead of `local`
        let rrs = records(&[("_http._tcp.example", ptr("Web._http._tcp.example"))]);
        let instance = ServiceInstance::assemble(&rrs);
        assert_eq!(instance.instance_name(), "Web");
        assert_eq!(instance.service_label(), "");
        assert_eq!(instance.protocol_label(), "");

        // `local` is matched byte for byte
        let rrs = records(&[("_http._tcp.LOCAL", ptr("X._http._tcp.LOCAL"))]);
        let instance = ServiceInstance::assemble(&rrs);
        assert_eq!(instance.instance_name(), "X");
        assert_eq!(instance.service_label(), "");
        assert_eq!(instance.protocol_label(), "");
    }

    #[test]
    fn instance_name_is_utf8() {
        let rrs = records(&[(
            "_airplay._tcp.local",
            ptr("Wohnzimmer-Büro._airplay._tcp.local"),
        )]);
        let instance = ServiceInstance::assemble(&rrs);
        assert_eq!(instance.instance_name(), "Wohnzimmer-Büro");
        assert_eq!(instance.service_label(), "airplay");
    }

    #[test]
    fn srv_root_target_and_unknown_records() {
        let rrs = records(&[
            ("x._http._tcp.local", srv(".", 80)),
            (
                "x._http._tcp.local",
                Record::Other(Unknown::new(Type::HINFO, vec![0, 0])),
            ),
        ]);
        let instance = ServiceInstance::assemble(&rrs);
        assert_eq!(instance.host_port(), ":80");
        assert_eq!(instance.instance_name(), "");
    }
}
