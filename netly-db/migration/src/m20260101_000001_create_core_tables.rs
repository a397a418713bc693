use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Nodes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Nodes::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Nodes::Name).string().not_null())
                    .col(ColumnDef::new(Nodes::Ip).string().not_null())
                    .col(ColumnDef::new(Nodes::PrivateIp).string())
                    .col(ColumnDef::new(Nodes::SshPort).integer().not_null())
                    .col(ColumnDef::new(Nodes::Role).string().not_null())
                    .col(ColumnDef::new(Nodes::Status).string().not_null())
                    .col(ColumnDef::new(Nodes::AuthData).binary().not_null())
                    .col(ColumnDef::new(Nodes::WireguardPublicKey).string())
                    .col(ColumnDef::new(Nodes::GeoData).json().not_null())
                    .col(ColumnDef::new(Nodes::Stats).json().not_null())
                    .col(ColumnDef::new(Nodes::LastLog).text())
                    .col(
                        ColumnDef::new(Nodes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Nodes::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Nodes::DeletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Partial unique index: `ip` unique only among non-deleted rows (§3),
        // so a soft-deleted node's address can be reused or restored onto.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX idx_nodes_ip_live ON nodes (ip) WHERE deleted_at IS NULL",
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tunnels::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tunnels::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Tunnels::Name).string().not_null())
                    .col(ColumnDef::new(Tunnels::Protocol).string().not_null())
                    .col(ColumnDef::new(Tunnels::Type).string().not_null())
                    .col(ColumnDef::new(Tunnels::SourceNodeId).big_integer().not_null())
                    .col(ColumnDef::new(Tunnels::DestNodeId).big_integer().not_null())
                    .col(ColumnDef::new(Tunnels::SourcePort).integer().not_null())
                    .col(ColumnDef::new(Tunnels::DestPort).integer().not_null())
                    .col(ColumnDef::new(Tunnels::InternalIpv4).string().not_null())
                    .col(ColumnDef::new(Tunnels::InternalIpv6).string().not_null())
                    .col(ColumnDef::new(Tunnels::Config).json().not_null())
                    .col(ColumnDef::new(Tunnels::Hops).json().not_null())
                    .col(ColumnDef::new(Tunnels::Segments).json().not_null())
                    .col(ColumnDef::new(Tunnels::Status).string().not_null())
                    .col(
                        ColumnDef::new(Tunnels::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Tunnels::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Tunnels::DeletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Services::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Services::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Services::Name).string().not_null())
                    .col(ColumnDef::new(Services::Protocol).string().not_null())
                    .col(ColumnDef::new(Services::NodeId).big_integer().not_null())
                    .col(ColumnDef::new(Services::ListenPort).integer().not_null())
                    .col(ColumnDef::new(Services::RoutingMode).string().not_null())
                    .col(ColumnDef::new(Services::Config).json().not_null())
                    .col(ColumnDef::new(Services::Status).string().not_null())
                    .col(
                        ColumnDef::new(Services::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Services::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Services::DeletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TimelineEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TimelineEvents::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TimelineEvents::EventType).string().not_null())
                    .col(ColumnDef::new(TimelineEvents::Status).string().not_null())
                    .col(ColumnDef::new(TimelineEvents::Message).text().not_null())
                    .col(ColumnDef::new(TimelineEvents::Meta).json().not_null())
                    .col(
                        ColumnDef::new(TimelineEvents::ResourceType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TimelineEvents::ResourceId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TimelineEvents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_timeline_resource")
                    .table(TimelineEvents::Table)
                    .col(TimelineEvents::ResourceType)
                    .col(TimelineEvents::ResourceId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SystemSettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SystemSettings::Key)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SystemSettings::Value).json().not_null())
                    .col(
                        ColumnDef::new(SystemSettings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(IpAllocations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IpAllocations::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(IpAllocations::TunnelId).big_integer().not_null())
                    .col(ColumnDef::new(IpAllocations::NodeId).big_integer().not_null())
                    .col(ColumnDef::new(IpAllocations::IpAddress).string().not_null())
                    .col(
                        ColumnDef::new(IpAllocations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ip_allocations_node_ip")
                    .table(IpAllocations::Table)
                    .col(IpAllocations::NodeId)
                    .col(IpAllocations::IpAddress)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PortAllocations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PortAllocations::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PortAllocations::TunnelId).big_integer())
                    .col(ColumnDef::new(PortAllocations::ServiceId).big_integer())
                    .col(
                        ColumnDef::new(PortAllocations::NodeId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PortAllocations::Port).integer().not_null())
                    .col(ColumnDef::new(PortAllocations::Protocol).string().not_null())
                    .col(
                        ColumnDef::new(PortAllocations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_port_allocations_node_port_protocol")
                    .table(PortAllocations::Table)
                    .col(PortAllocations::NodeId)
                    .col(PortAllocations::Port)
                    .col(PortAllocations::Protocol)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PortAllocations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(IpAllocations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SystemSettings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TimelineEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Services::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tunnels::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Nodes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Nodes {
    Table,
    Id,
    Name,
    Ip,
    PrivateIp,
    SshPort,
    Role,
    Status,
    AuthData,
    WireguardPublicKey,
    GeoData,
    Stats,
    LastLog,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

#[derive(DeriveIden)]
enum Tunnels {
    Table,
    Id,
    Name,
    Protocol,
    Type,
    SourceNodeId,
    DestNodeId,
    SourcePort,
    DestPort,
    InternalIpv4,
    InternalIpv6,
    Config,
    Hops,
    Segments,
    Status,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

#[derive(DeriveIden)]
enum Services {
    Table,
    Id,
    Name,
    Protocol,
    NodeId,
    ListenPort,
    RoutingMode,
    Config,
    Status,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

#[derive(DeriveIden)]
enum TimelineEvents {
    Table,
    Id,
    EventType,
    Status,
    Message,
    Meta,
    ResourceType,
    ResourceId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum SystemSettings {
    Table,
    Key,
    Value,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum IpAllocations {
    Table,
    Id,
    TunnelId,
    NodeId,
    IpAddress,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PortAllocations {
    Table,
    Id,
    TunnelId,
    ServiceId,
    NodeId,
    Port,
    Protocol,
    CreatedAt,
}
