//! Multigraph definitions for TeamSpeak 3 virtual servers.

use tsmunin_sdk::{FieldSpec, MetricGroup, StatSource, register_group};

pub static BANDWIDTH: MetricGroup = MetricGroup {
    key: "bandwidth",
    graph: "teamspeak_transfer",
    position: 10,
    header: &[
        "graph_title Teamspeak Bandwidth",
        "graph_args --base 1024",
        "graph_vlabel bytes in (-) / out (+)",
        "graph_category voip",
        "graph_info graph showing the voice bandwidth in and out",
    ],
    fields: &[
        FieldSpec {
            prefix: "down",
            source: StatSource::Raw("connection_bytes_received_total"),
            attributes: &[
                "label {name}",
                "info serverid {sid}'s amount of bytes received in the last 5 minutes",
                "type DERIVE",
                "graph no",
                "min 0",
            ],
        },
        FieldSpec {
            prefix: "up",
            source: StatSource::Raw("connection_bytes_sent_total"),
            attributes: &[
                "label {name}",
                "info serverid {sid}'s amount of bytes sent in the last 5 minutes",
                "type DERIVE",
                "negative down_{sid}",
                "min 0",
            ],
        },
    ],
};

pub static FILETRANSFER: MetricGroup = MetricGroup {
    key: "filetransfer",
    graph: "teamspeak_fttransfer",
    position: 20,
    header: &[
        "graph_title Teamspeak File Bandwidth",
        "graph_args --base 1024",
        "graph_vlabel bytes in (-) / out (+)",
        "graph_category voip",
        "graph_info graph showing the file bandwidth in and out",
    ],
    fields: &[
        FieldSpec {
            prefix: "ftdown",
            source: StatSource::Raw("connection_filetransfer_bytes_received_total"),
            attributes: &[
                "label {name}",
                "info serverid {sid}'s amount of filetransfer bytes received in the last 5 minutes",
                "type DERIVE",
                "graph no",
                "min 0",
            ],
        },
        FieldSpec {
            prefix: "ftup",
            source: StatSource::Raw("connection_filetransfer_bytes_sent_total"),
            attributes: &[
                "label {name}",
                "info serverid {sid}'s amount of filetransfer bytes sent in the last 5 minutes",
                "type DERIVE",
                "negative ftdown_{sid}",
                "min 0",
            ],
        },
    ],
};

pub static UPTIME: MetricGroup = MetricGroup {
    key: "uptime",
    graph: "teamspeak_uptime",
    position: 30,
    header: &[
        "graph_title TeamSpeak Uptime",
        "graph_args --base 1000 -l 0",
        "graph_scale no",
        "graph_vlabel days",
        "graph_category voip",
        "graph_info graph showing TeamSpeak3 virtual server uptime",
    ],
    fields: &[FieldSpec {
        prefix: "uptime",
        source: StatSource::Raw("virtualserver_uptime"),
        attributes: &[
            "label {name}",
            "info serverid {sid}'s uptime",
            "cdef uptime_{sid},86400,/",
            "min 0",
            "draw AREA",
        ],
    }],
};

pub static USERS: MetricGroup = MetricGroup {
    key: "users",
    graph: "teamspeak_usercount",
    position: 40,
    header: &[
        "graph_title TeamSpeak User Count",
        "graph_args --base 1000 -l 0",
        "graph_printf %.0lf",
        "graph_vlabel connected users",
        "graph_category voip",
        "graph_info graph showing the number of connected users to the server",
    ],
    fields: &[
        FieldSpec {
            prefix: "user",
            source: StatSource::ConnectedClients,
            attributes: &[
                "label {name} users",
                "info users connected to serverid_{sid} in the last 5 minutes",
                "min 0",
            ],
        },
        FieldSpec {
            prefix: "queryuser",
            source: StatSource::Raw("virtualserver_queryclientsonline"),
            attributes: &[
                "label {name} queryusers",
                "info queryusers connected to serverid_{sid} in the last 5 minutes",
                "min 0",
            ],
        },
    ],
};

pub static PING: MetricGroup = MetricGroup {
    key: "ping",
    graph: "teamspeak_ping",
    position: 50,
    header: &[
        "graph_title TeamSpeak Ping",
        "graph_args --base 1000 -l 0",
        "graph_printf %.0lf",
        "graph_vlabel Ping",
        "graph_category voip",
        "graph_info graph showing the average ping",
    ],
    fields: &[FieldSpec {
        prefix: "ping",
        source: StatSource::Raw("virtualserver_total_ping"),
        attributes: &[
            "label {name}",
            "info average ping of users connected to serverid_{sid}",
            "min 0",
        ],
    }],
};

pub static PKTLOSS: MetricGroup = MetricGroup {
    key: "pktloss",
    graph: "teamspeak_pktloss",
    position: 60,
    header: &[
        "graph_title TeamSpeak packetloss statistics",
        "graph_args --base 1000 -l 0 -u 100 -r",
        "graph_scale no",
        "graph_vlabel packetloss in %",
        "graph_category voip",
        "graph_info graph showing packetloss statistics",
    ],
    fields: &[
        FieldSpec {
            prefix: "speech",
            source: StatSource::Raw("virtualserver_total_packetloss_speech"),
            attributes: &[
                "label {name} speech",
                "info serverid {sid}'s average speech packetloss",
                "min 0",
                "draw STACK",
            ],
        },
        FieldSpec {
            prefix: "keepalive",
            source: StatSource::Raw("virtualserver_total_packetloss_keepalive"),
            attributes: &[
                "label {name} keepalive",
                "info serverid {sid}'s average keepalive packetloss",
                "min 0",
                "draw STACK",
            ],
        },
        FieldSpec {
            prefix: "control",
            source: StatSource::Raw("virtualserver_total_packetloss_control"),
            attributes: &[
                "label {name} control",
                "info serverid {sid}'s average control packetloss",
                "min 0",
                "draw STACK",
            ],
        },
        FieldSpec {
            prefix: "total",
            source: StatSource::Raw("virtualserver_total_packetloss_total"),
            attributes: &[
                "label {name} total",
                "info serverid {sid}'s combined average packetloss",
                "min 0",
                "draw STACK",
            ],
        },
    ],
};

register_group!(&BANDWIDTH);
register_group!(&FILETRANSFER);
register_group!(&UPTIME);
register_group!(&USERS);
register_group!(&PING);
register_group!(&PKTLOSS);
