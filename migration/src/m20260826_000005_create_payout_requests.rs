use sea_orm_migration::prelude::*;

use super::{
  m20260826_000001_create_users::Users,
  m20260826_000002_create_affiliates::Affiliates,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(PayoutRequests::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(PayoutRequests::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(
            ColumnDef::new(PayoutRequests::AffiliateId).integer().not_null(),
          )
          .col(
            ColumnDef::new(PayoutRequests::UserId).big_integer().not_null(),
          )
          .col(ColumnDef::new(PayoutRequests::MonthKey).string().not_null())
          .col(ColumnDef::new(PayoutRequests::MonthSlot).string().null())
          .col(ColumnDef::new(PayoutRequests::Amount).big_integer().not_null())
          .col(
            ColumnDef::new(PayoutRequests::Status)
              .string()
              .not_null()
              .default("requested"),
          )
          .col(
            ColumnDef::new(PayoutRequests::AccountHolder).string().not_null(),
          )
          .col(ColumnDef::new(PayoutRequests::BankAccount).string().not_null())
          .col(ColumnDef::new(PayoutRequests::Ifsc).string().not_null())
          .col(ColumnDef::new(PayoutRequests::BankName).string().not_null())
          .col(ColumnDef::new(PayoutRequests::City).string().not_null())
          .col(ColumnDef::new(PayoutRequests::UpiId).string().null())
          .col(ColumnDef::new(PayoutRequests::Pan).string().not_null())
          .col(ColumnDef::new(PayoutRequests::Aadhaar).string().not_null())
          .col(ColumnDef::new(PayoutRequests::PayoutRef).string().null())
          .col(ColumnDef::new(PayoutRequests::Utr).string().null())
          .col(ColumnDef::new(PayoutRequests::AdminNote).string().null())
          .col(ColumnDef::new(PayoutRequests::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(PayoutRequests::UpdatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_payout_requests_affiliate")
              .from(PayoutRequests::Table, PayoutRequests::AffiliateId)
              .to(Affiliates::Table, Affiliates::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_payout_requests_user")
              .from(PayoutRequests::Table, PayoutRequests::UserId)
              .to(Users::Table, Users::UserId)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    // One non-rejected request per (affiliate, month). month_slot mirrors
    // month_key and is cleared on rejection; NULL never conflicts, so a
    // rejected month can be requested again while history rows persist.
    manager
      .create_index(
        Index::create()
          .name("idx_payout_requests_month_slot")
          .table(PayoutRequests::Table)
          .col(PayoutRequests::AffiliateId)
          .col(PayoutRequests::MonthSlot)
          .unique()
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_payout_requests_affiliate")
          .table(PayoutRequests::Table)
          .col(PayoutRequests::AffiliateId)
          .col(PayoutRequests::MonthKey)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(PayoutRequests::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum PayoutRequests {
  Table,
  Id,
  AffiliateId,
  UserId,
  MonthKey,
  MonthSlot,
  Amount,
  Status,
  AccountHolder,
  BankAccount,
  Ifsc,
  BankName,
  City,
  UpiId,
  Pan,
  Aadhaar,
  PayoutRef,
  Utr,
  AdminNote,
  CreatedAt,
  UpdatedAt,
}
